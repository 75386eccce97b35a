//! Image providers and the ordered fallback chain that consults them.
//!
//! Providers are tried in registration order; any provider error or empty
//! result silently advances to the next one. Only exhausting the whole chain
//! surfaces as [`IllustraError::NoImageAvailable`].

mod download;
mod material;
mod pexels;
mod placeholder;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use illustra_shared::{IllustraError, ImageAsset, ImageRequest, Result, UsedImageSet};

pub use download::{Downloader, download_file_name, slugify};
pub use material::{IMAGE_EXTENSIONS, MaterialDirectoryProvider, list_images};
pub use pexels::PexelsProvider;
pub use placeholder::PlaceholderProvider;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("illustra/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow (placeholder services redirect to a CDN).
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A single image-acquisition strategy.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Whether this provider handles this kind of request at all.
    fn supports(&self, request: &ImageRequest) -> bool;

    /// Try to produce an image not yet in `used`.
    ///
    /// `Ok(None)` means "no match"; the chain moves on either way.
    async fn try_resolve(
        &self,
        request: &ImageRequest,
        used: &UsedImageSet,
    ) -> Result<Option<ImageAsset>>;

    /// Human-readable provider name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Holds providers in priority order.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ImageProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider at the lowest priority.
    pub fn push(&mut self, provider: Box<dyn ImageProvider>) {
        self.providers.push(provider);
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve one image, recording its identity in `used`.
    ///
    /// A malformed material directory is a configuration error and is
    /// returned as-is; every other provider failure only advances the chain.
    #[instrument(skip_all, fields(request = %request))]
    pub async fn resolve(
        &self,
        request: &ImageRequest,
        used: &mut UsedImageSet,
    ) -> Result<ImageAsset> {
        let mut tried: Vec<String> = Vec::new();

        for provider in self.providers.iter().filter(|p| p.supports(request)) {
            tried.push(provider.name().to_string());

            match provider.try_resolve(request, used).await {
                Ok(Some(asset)) => {
                    if !used.insert(asset.identity.clone()) {
                        warn!(provider = provider.name(), identity = %asset.identity, "provider returned an image already used");
                        continue;
                    }
                    info!(
                        provider = provider.name(),
                        path = %asset.local_path.display(),
                        "image resolved"
                    );
                    return Ok(asset);
                }
                Ok(None) => {
                    debug!(provider = provider.name(), "no match, trying next provider");
                }
                Err(e @ IllustraError::MaterialDirectoryInvalid { .. }) => return Err(e),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                }
            }
        }

        Err(IllustraError::NoImageAvailable {
            request: request.to_string(),
            tried,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the given per-request timeout.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IllustraError::Network(format!("failed to build HTTP client: {e}")))
}
