//! Image hosting collaborator.
//!
//! The pipeline only needs two things from a host: a URL usable inside the
//! article body, and a permanent media id for the cover.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument};

use illustra_shared::{IllustraError, Result, UploadConfig, read_secret_env};

/// Uploads local image files to an external host.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload an in-body image; returns its hosted URL.
    async fn upload_content_image(&self, path: &Path) -> Result<String>;

    /// Upload the cover as permanent material; returns its media id.
    async fn upload_cover(&self, path: &Path) -> Result<String>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// WeChat official account API
// ---------------------------------------------------------------------------

const CONTENT_IMAGE_PATH: &str = "/cgi-bin/media/uploadimg";
const MATERIAL_PATH: &str = "/cgi-bin/material/add_material";

/// Multipart part name expected by the API.
const MEDIA_FIELD: &str = "media";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    media_id: Option<String>,
}

/// Uploader for the WeChat official account media API.
pub struct WeChatUploader {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl WeChatUploader {
    pub fn new(client: Client, endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Build from `[upload]` config, reading the token from its env var.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let token = read_secret_env(&config.access_token_env).ok_or_else(|| {
            IllustraError::config(format!(
                "upload access token not set (export {})",
                config.access_token_env
            ))
        })?;
        let client = illustra_sources::http_client(config.timeout_secs)?;
        Ok(Self::new(client, &config.endpoint, token))
    }

    async fn post_image(
        &self,
        api_path: &str,
        extra_query: &[(&str, &str)],
        path: &Path,
    ) -> Result<ApiResponse> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| IllustraError::io(path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))
            .map_err(|e| IllustraError::validation(format!("invalid mime type: {e}")))?;
        let form = Form::new().part(MEDIA_FIELD, part);

        let url = format!("{}{api_path}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .query(extra_query)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IllustraError::Network(format!("upload to {api_path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IllustraError::upload_rejected(format!(
                "{api_path} returned HTTP {status}"
            )));
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| IllustraError::upload_rejected(format!("unreadable response: {e}")))?;

        if body.errcode != 0 {
            return Err(IllustraError::upload_rejected(format!(
                "errcode {}: {}",
                body.errcode,
                body.errmsg.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl Uploader for WeChatUploader {
    #[instrument(skip_all, fields(path = %path.display()))]
    async fn upload_content_image(&self, path: &Path) -> Result<String> {
        let body = self.post_image(CONTENT_IMAGE_PATH, &[], path).await?;
        let url = body
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| IllustraError::upload_rejected("response has no url"))?;
        debug!(%url, "content image uploaded");
        Ok(url)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn upload_cover(&self, path: &Path) -> Result<String> {
        let body = self
            .post_image(MATERIAL_PATH, &[("type", "image")], path)
            .await?;
        let media_id = body
            .media_id
            .filter(|m| !m.is_empty())
            .ok_or_else(|| IllustraError::upload_rejected("response has no media_id"))?;
        debug!(%media_id, "cover uploaded");
        Ok(media_id)
    }

    fn name(&self) -> &str {
        "wechat"
    }
}

/// MIME type from the file extension; unknown extensions default to JPEG.
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
