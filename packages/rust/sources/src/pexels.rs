//! Primary keyword search provider backed by the Pexels search API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use illustra_shared::{
    IllustraError, ImageAsset, ImageRequest, ImageSource, Result, UsedImageSet, short_hash,
};

use crate::{Downloader, ImageProvider};

const PROVIDER_NAME: &str = "pexels";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: u64,
    width: u32,
    height: u32,
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    #[serde(default)]
    landscape: Option<String>,
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    original: Option<String>,
}

impl Photo {
    fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    fn best_url(&self) -> Option<&str> {
        self.src
            .landscape
            .as_deref()
            .or(self.src.large.as_deref())
            .or(self.src.original.as_deref())
    }
}

/// Searches by keyword phrase and downloads the first unused landscape result.
pub struct PexelsProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    per_page: u32,
    downloader: Downloader,
}

impl PexelsProvider {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        per_page: u32,
        downloader: Downloader,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            per_page,
            downloader,
        }
    }

    async fn search(&self, phrase: &str) -> Result<Vec<Photo>> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| IllustraError::config(format!("invalid search endpoint {}: {e}", self.endpoint)))?;
        url.query_pairs_mut()
            .append_pair("query", phrase)
            .append_pair("orientation", "landscape")
            .append_pair("per_page", &self.per_page.to_string());

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .send()
            .await
            .map_err(|e| IllustraError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IllustraError::Network(format!("search returned HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| IllustraError::parse(format!("invalid search response: {e}")))?;
        Ok(body.photos)
    }
}

fn identity_for(url: &str) -> String {
    format!("{PROVIDER_NAME}:{}", short_hash(url))
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    fn supports(&self, request: &ImageRequest) -> bool {
        matches!(request, ImageRequest::Search { .. })
    }

    #[instrument(skip_all, fields(provider = PROVIDER_NAME))]
    async fn try_resolve(
        &self,
        request: &ImageRequest,
        used: &UsedImageSet,
    ) -> Result<Option<ImageAsset>> {
        let ImageRequest::Search { phrase } = request else {
            return Ok(None);
        };

        let photos = self.search(phrase).await?;
        debug!(phrase = %phrase, results = photos.len(), "search completed");

        let candidate = photos
            .iter()
            .filter(|photo| photo.is_landscape())
            .filter_map(|photo| photo.best_url().map(|url| (photo.id, url)))
            .find(|(_, url)| !used.contains(&identity_for(url)));

        let Some((id, url)) = candidate else {
            return Ok(None);
        };

        // Same phrase, different photo: the id keeps file names apart.
        let seed = format!("{phrase}#{id}");
        let local_path = self
            .downloader
            .download(url, PROVIDER_NAME, phrase, &seed)
            .await?;

        Ok(Some(ImageAsset {
            local_path,
            source: ImageSource::Downloaded {
                provider: PROVIDER_NAME.into(),
            },
            identity: identity_for(url),
            hosted_url: None,
        }))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
