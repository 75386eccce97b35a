//! Fetching image bytes and writing them to the run's cache directory.

use std::path::PathBuf;

use reqwest::Client;
use tracing::debug;

use illustra_shared::{IllustraError, Result, short_hash};

/// Maximum slug length in file names.
const MAX_SLUG_CHARS: usize = 40;

/// Upper bound on a downloaded image (20 MB).
const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Downloads image URLs into a local directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.into(),
        }
    }

    /// Fetch `url` and store it as `<provider>-<slug>_<hash>.<ext>`.
    ///
    /// `seed` is the string hashed into the file name (normally the raw query).
    pub async fn download(&self, url: &str, provider: &str, query: &str, seed: &str) -> Result<PathBuf> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IllustraError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IllustraError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_IMAGE_BYTES {
                return Err(IllustraError::validation(format!(
                    "{url}: image too large ({len} bytes, max {MAX_IMAGE_BYTES})"
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = &content_type {
            if !ct.starts_with("image/") {
                return Err(IllustraError::validation(format!(
                    "{url}: expected an image, got {ct}"
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IllustraError::Network(format!("{url}: failed to read body: {e}")))?;

        if bytes.is_empty() {
            return Err(IllustraError::validation(format!("{url}: empty image body")));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| IllustraError::io(&self.dir, e))?;

        let ext = extension_for(content_type.as_deref());
        let path = self
            .dir
            .join(download_file_name(provider, query, seed, ext));

        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| IllustraError::io(&path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "image downloaded");
        Ok(path)
    }
}

/// Deterministic download file name: `<provider>-<slug>_<hash8>.<ext>`.
pub fn download_file_name(provider: &str, query: &str, seed: &str, ext: &str) -> String {
    format!("{provider}-{}_{}.{ext}", slugify(query), short_hash(seed))
}

/// Lower-case ASCII slug; non-alphanumerics collapse to single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_end_matches('-').chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug.to_string()
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "jpg",
    }
}
