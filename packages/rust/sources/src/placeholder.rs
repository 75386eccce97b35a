//! Deterministic placeholder provider (Lorem Picsum style seeded URLs).
//!
//! The seed is derived from the query phrase, so the same phrase always maps
//! to the same image. Topical relevance is not guaranteed; this provider is the
//! last resort that keeps a publish from failing for lack of an image.

use async_trait::async_trait;
use tracing::debug;

use illustra_shared::{ImageAsset, ImageRequest, ImageSource, Result, UsedImageSet, short_hash};

use crate::{Downloader, ImageProvider};

const PROVIDER_NAME: &str = "picsum";

/// Seeded variants tried per phrase before giving up on fresh images.
const MAX_VARIANTS: usize = 5;

const DEFAULT_WIDTH: u32 = 1200;
const DEFAULT_HEIGHT: u32 = 800;

/// Resolves any search phrase to a seeded placeholder image.
pub struct PlaceholderProvider {
    endpoint: String,
    width: u32,
    height: u32,
    downloader: Downloader,
}

impl PlaceholderProvider {
    pub fn new(endpoint: impl Into<String>, downloader: Downloader) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            downloader,
        }
    }

    /// Override the requested image dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn image_url(&self, seed: &str) -> String {
        format!("{}/seed/{seed}/{}/{}", self.endpoint, self.width, self.height)
    }
}

/// Hash input for variant `n` of `phrase`; variant 0 is the bare phrase.
fn variant_key(phrase: &str, n: usize) -> String {
    if n == 0 {
        phrase.to_string()
    } else {
        format!("{phrase}#{n}")
    }
}

fn identity_for(seed: &str) -> String {
    format!("{PROVIDER_NAME}:{seed}")
}

#[async_trait]
impl ImageProvider for PlaceholderProvider {
    fn supports(&self, request: &ImageRequest) -> bool {
        matches!(request, ImageRequest::Search { .. })
    }

    async fn try_resolve(
        &self,
        request: &ImageRequest,
        used: &UsedImageSet,
    ) -> Result<Option<ImageAsset>> {
        let ImageRequest::Search { phrase } = request else {
            return Ok(None);
        };

        let Some((key, seed)) = (0..MAX_VARIANTS)
            .map(|n| {
                let key = variant_key(phrase, n);
                let seed = short_hash(&key);
                (key, seed)
            })
            .find(|(_, seed)| !used.contains(&identity_for(seed)))
        else {
            debug!(phrase = %phrase, "every placeholder variant already used");
            return Ok(None);
        };

        let url = self.image_url(&seed);
        let local_path = self
            .downloader
            .download(&url, PROVIDER_NAME, phrase, &key)
            .await?;

        Ok(Some(ImageAsset {
            local_path,
            source: ImageSource::Downloaded {
                provider: PROVIDER_NAME.into(),
            },
            identity: identity_for(&seed),
            hosted_url: None,
        }))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use reqwest::Client;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("illustra-picsum-{}", uuid::Uuid::now_v7()))
    }

    async fn placeholder_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/seed/[0-9a-f]{8}/\d+/\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
            .mount(&server)
            .await;
        server
    }

    fn search(phrase: &str) -> ImageRequest {
        ImageRequest::Search {
            phrase: phrase.into(),
        }
    }

    #[tokio::test]
    async fn same_phrase_reproduces_same_identity() {
        let server = placeholder_server().await;
        let dir = temp_dir();
        let provider = PlaceholderProvider::new(server.uri(), Downloader::new(Client::new(), &dir));

        // Two independent runs, each with a fresh used set.
        let first = provider
            .try_resolve(&search("mountain lake"), &UsedImageSet::new())
            .await
            .unwrap()
            .unwrap();
        let second = provider
            .try_resolve(&search("mountain lake"), &UsedImageSet::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.identity, second.identity);
        assert_eq!(first.local_path, second.local_path);
        assert_eq!(first.identity, format!("picsum:{}", short_hash("mountain lake")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn requests_seeded_url_with_dimensions() {
        let server = MockServer::start().await;
        let seed = short_hash("forest");
        Mock::given(method("GET"))
            .and(path(format!("/seed/{seed}/640/480")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = temp_dir();
        let provider = PlaceholderProvider::new(format!("{}/", server.uri()), Downloader::new(Client::new(), &dir))
            .with_size(640, 480);
        let asset = provider
            .try_resolve(&search("forest"), &UsedImageSet::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(asset.local_path.extension().unwrap(), "png");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn used_variant_advances_to_next_seed() {
        let server = placeholder_server().await;
        let dir = temp_dir();
        let provider = PlaceholderProvider::new(server.uri(), Downloader::new(Client::new(), &dir));

        let mut used = UsedImageSet::new();
        let first = provider.try_resolve(&search("desk"), &used).await.unwrap().unwrap();
        used.insert(first.identity.clone());
        let second = provider.try_resolve(&search("desk"), &used).await.unwrap().unwrap();

        assert_ne!(first.identity, second.identity);
        assert_ne!(first.local_path, second.local_path);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn exhausted_variants_are_no_match() {
        let provider = PlaceholderProvider::new("http://127.0.0.1:9", Downloader::new(Client::new(), temp_dir()));
        let mut used = UsedImageSet::new();
        for n in 0..MAX_VARIANTS {
            used.insert(identity_for(&short_hash(&variant_key("desk", n))));
        }
        assert!(provider.try_resolve(&search("desk"), &used).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_errors_propagate_to_the_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = PlaceholderProvider::new(server.uri(), Downloader::new(Client::new(), temp_dir()));
        assert!(provider.try_resolve(&search("x"), &UsedImageSet::new()).await.is_err());
    }
}
