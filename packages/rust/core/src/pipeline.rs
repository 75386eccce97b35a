//! End-to-end enrichment run: content → cover → section images → inline rewrite.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use illustra_content::{MarkdownRenderer, default_renderer, load_content};
use illustra_keywords::{KeywordExtractor, TranslationTables};
use illustra_shared::{
    AppConfig, DefaultsConfig, IllustraError, ImageAsset, ImageRequest, Result, RunContext, RunId,
    read_secret_env,
};
use illustra_sources::{
    Downloader, MaterialDirectoryProvider, PexelsProvider, PlaceholderProvider, ProviderChain,
    http_client, list_images,
};

use crate::embed::ContentEmbedder;
use crate::upload::{Uploader, WeChatUploader};

/// Timeout for image downloads, which can be much larger than search responses.
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Insert images into article sections.
    pub content_images: bool,
    pub max_cover_keywords: usize,
    pub max_section_keywords: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(&DefaultsConfig::default())
    }
}

impl From<&DefaultsConfig> for RunConfig {
    fn from(defaults: &DefaultsConfig) -> Self {
        Self {
            content_images: defaults.content_images,
            max_cover_keywords: defaults.max_cover_keywords,
            max_section_keywords: defaults.max_section_keywords,
        }
    }
}

/// Inputs for one article.
#[derive(Debug, Clone)]
pub struct EnrichRequest {
    /// Markdown, HTML or plain text article.
    pub content_file: PathBuf,
    /// Explicit cover image; takes priority over every provider.
    pub cover: Option<PathBuf>,
    /// User-curated images preferred over keyword search.
    pub material_dir: Option<PathBuf>,
}

impl EnrichRequest {
    pub fn new(content_file: impl Into<PathBuf>) -> Self {
        Self {
            content_file: content_file.into(),
            cover: None,
            material_dir: None,
        }
    }

    /// Directory that relative inline image paths resolve against.
    pub fn base_dir(&self) -> &Path {
        self.content_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: RunId,
    /// Enriched HTML.
    pub content: String,
    pub cover: ImageAsset,
    /// Permanent media id returned for the cover upload.
    pub cover_media_id: String,
    pub section_images: Vec<ImageAsset>,
    /// Slots that were left without an image.
    pub skipped_slots: Vec<usize>,
    /// Number of distinct local `<img>` references rewritten.
    pub inline_rewritten: usize,
    pub elapsed: std::time::Duration,
}

impl RunOutcome {
    /// Assets fetched over the network during this run.
    pub fn downloaded(&self) -> impl Iterator<Item = &ImageAsset> {
        std::iter::once(&self.cover)
            .chain(self.section_images.iter())
            .filter(|a| a.is_ephemeral())
    }

    /// Delete downloaded files; user covers and material images are kept.
    ///
    /// Call after the host-side publish step has consumed the uploads.
    /// Returns the number of files removed.
    pub fn cleanup(&self) -> usize {
        delete_assets(self.downloaded())
    }
}

fn delete_assets<'a>(assets: impl Iterator<Item = &'a ImageAsset>) -> usize {
    let mut removed = 0;
    for asset in assets.filter(|a| a.is_ephemeral()) {
        match std::fs::remove_file(&asset.local_path) {
            Ok(()) => {
                debug!(path = %asset.local_path.display(), "removed downloaded image");
                removed += 1;
            }
            Err(e) => {
                warn!(path = %asset.local_path.display(), error = %e, "failed to remove downloaded image");
            }
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a section slot receives an image.
    fn slot_filled(&self, position: usize, provider: &str);
    /// Called when a section slot is left empty.
    fn slot_skipped(&self, position: usize, reason: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &RunOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn slot_filled(&self, _position: usize, _provider: &str) {}
    fn slot_skipped(&self, _position: usize, _reason: &str) {}
    fn done(&self, _outcome: &RunOutcome) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Collaborators shared by every run.
///
/// Nothing run-specific lives here; each [`Pipeline::run`] builds a fresh
/// [`RunContext`], so repeated runs never see each other's used sets.
pub struct Pipeline {
    extractor: KeywordExtractor,
    chain: ProviderChain,
    uploader: Box<dyn Uploader>,
    renderer: Box<dyn MarkdownRenderer>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(
        extractor: KeywordExtractor,
        chain: ProviderChain,
        uploader: Box<dyn Uploader>,
        renderer: Box<dyn MarkdownRenderer>,
        config: RunConfig,
    ) -> Self {
        Self {
            extractor,
            chain,
            uploader,
            renderer,
            config,
        }
    }

    /// Wire the production collaborators from the application config.
    ///
    /// Downloads land in `cache_dir`.
    pub fn from_config(config: &AppConfig, cache_dir: &Path) -> Result<Self> {
        let tables = match &config.keywords.table_file {
            Some(path) => TranslationTables::load(Path::new(path))?,
            None => TranslationTables::builtin(),
        };
        Ok(Self::new(
            KeywordExtractor::new(tables),
            build_chain(config, cache_dir)?,
            Box::new(WeChatUploader::from_config(&config.upload)?),
            default_renderer(),
            RunConfig::from(&config.defaults),
        ))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Enrich one article.
    ///
    /// Fatal: unreadable content, an invalid material directory, no cover
    /// image from any source, or a rejected cover upload. Everything else is
    /// logged and the run continues.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, content = %request.content_file.display()))]
    pub async fn run(
        &self,
        request: &EnrichRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut ctx = RunContext::new();
        tracing::Span::current().record("run_id", tracing::field::display(&ctx.run_id));

        info!(run_id = %ctx.run_id, providers = ?self.chain.names(), "starting enrichment run");

        // --- Phase 1: Content ---
        progress.phase("Loading content");
        let content = load_content(&request.content_file, self.renderer.as_ref())?;

        if let Some(dir) = &request.material_dir {
            let images = list_images(dir)?;
            debug!(dir = %dir.display(), images = images.len(), "material directory ok");
        }

        // --- Phase 2: Cover ---
        progress.phase("Resolving cover image");
        let cover = self.resolve_cover(&content, request, &mut ctx).await?;

        progress.phase("Uploading cover image");
        let cover_media_id = match self.uploader.upload_cover(&cover.local_path).await {
            Ok(id) => id,
            Err(e) => {
                delete_assets(std::iter::once(&cover));
                return Err(e);
            }
        };

        // --- Phase 3: Section images ---
        let embedder = ContentEmbedder::new(&self.extractor, &self.chain, self.uploader.as_ref());
        let (content, section_images, skipped_slots) = if self.config.content_images {
            progress.phase("Embedding section images");
            let embedding = embedder
                .embed_sections(
                    &content,
                    self.config.max_section_keywords,
                    request.material_dir.as_deref(),
                    &mut ctx,
                    progress,
                )
                .await;
            (embedding.html, embedding.images, embedding.skipped)
        } else {
            debug!("section images disabled");
            (content, Vec::new(), Vec::new())
        };

        // --- Phase 4: Inline images ---
        progress.phase("Rewriting inline images");
        let inline = embedder.rewrite_inline(&content, request.base_dir()).await;

        let outcome = RunOutcome {
            run_id: ctx.run_id,
            content: inline.html,
            cover,
            cover_media_id,
            section_images,
            skipped_slots,
            inline_rewritten: inline.replaced.len(),
            elapsed: start.elapsed(),
        };

        info!(
            cover = outcome.cover.provider(),
            section_images = outcome.section_images.len(),
            skipped = outcome.skipped_slots.len(),
            inline = outcome.inline_rewritten,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "enrichment complete"
        );

        progress.done(&outcome);
        Ok(outcome)
    }

    /// Cover priority: explicit file, then material directory, then article keyword search.
    async fn resolve_cover(
        &self,
        content: &str,
        request: &EnrichRequest,
        ctx: &mut RunContext,
    ) -> Result<ImageAsset> {
        if let Some(path) = &request.cover {
            if !path.is_file() {
                return Err(IllustraError::validation(format!(
                    "cover image {} does not exist",
                    path.display()
                )));
            }
            info!(path = %path.display(), "using supplied cover");
            return Ok(ImageAsset::user_supplied(path));
        }

        if let Some(dir) = &request.material_dir {
            let directory = ImageRequest::Directory { dir: dir.clone() };
            match self.chain.resolve(&directory, &mut ctx.used_images).await {
                Ok(asset) => return Ok(asset),
                Err(IllustraError::NoImageAvailable { .. }) => {
                    info!("material directory has no cover candidate, searching");
                }
                Err(e) => return Err(e),
            }
        }

        let terms = self.extractor.extract_article(
            content,
            self.config.max_cover_keywords,
            &mut ctx.used_keywords,
        );
        self.chain
            .resolve(&ImageRequest::search(&terms), &mut ctx.used_images)
            .await
    }
}

/// Build the provider chain in priority order: material directory, primary
/// search (only when its API key is set), deterministic placeholder.
pub fn build_chain(config: &AppConfig, cache_dir: &Path) -> Result<ProviderChain> {
    let downloader = Downloader::new(http_client(DOWNLOAD_TIMEOUT_SECS)?, cache_dir);
    let mut chain = ProviderChain::default();
    chain.push(Box::new(MaterialDirectoryProvider::new()));

    match read_secret_env(&config.search.api_key_env) {
        Some(key) => chain.push(Box::new(PexelsProvider::new(
            http_client(config.search.timeout_secs)?,
            &config.search.endpoint,
            key,
            config.search.per_page,
            downloader.clone(),
        ))),
        None => warn!(
            env = %config.search.api_key_env,
            "search API key not set, only placeholder images will be used"
        ),
    }

    chain.push(Box::new(PlaceholderProvider::new(
        &config.search.placeholder_endpoint,
        downloader,
    )));
    Ok(chain)
}
