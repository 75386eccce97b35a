//! Section image embedding and inline image rewriting.
//!
//! Neither operation fails as a whole: a slot or inline image that cannot be
//! resolved or uploaded is logged and left as it was.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use illustra_content::{Document, image_block, local_image_sources, rewrite_sources};
use illustra_keywords::KeywordExtractor;
use illustra_shared::{IllustraError, ImageAsset, ImageRequest, Result, RunContext, Section};
use illustra_sources::ProviderChain;

use crate::pipeline::ProgressReporter;
use crate::upload::Uploader;

/// Result of the section embedding pass.
#[derive(Debug, Default)]
pub struct SectionEmbedding {
    /// Content with image blocks inserted.
    pub html: String,
    /// Every image acquired for a slot, including ones whose upload failed.
    pub images: Vec<ImageAsset>,
    /// Slots that ended up without an image.
    pub skipped: Vec<usize>,
}

impl SectionEmbedding {
    pub fn inserted(&self) -> usize {
        self.images.iter().filter(|a| a.hosted_url.is_some()).count()
    }
}

/// Result of the inline rewrite pass.
#[derive(Debug, Default)]
pub struct InlineRewrite {
    pub html: String,
    /// Local `src` value → hosted URL, for every reference that was replaced.
    pub replaced: HashMap<String, String>,
}

/// Places hosted images into content using the run's collaborators.
pub struct ContentEmbedder<'a> {
    extractor: &'a KeywordExtractor,
    chain: &'a ProviderChain,
    uploader: &'a dyn Uploader,
}

impl<'a> ContentEmbedder<'a> {
    pub fn new(
        extractor: &'a KeywordExtractor,
        chain: &'a ProviderChain,
        uploader: &'a dyn Uploader,
    ) -> Self {
        Self {
            extractor,
            chain,
            uploader,
        }
    }

    /// Insert one centered image after the heading of every chosen slot.
    ///
    /// With a material directory, each slot first asks the directory and only
    /// falls back to keyword search once the directory is exhausted.
    #[instrument(skip_all, fields(run_id = %ctx.run_id))]
    pub async fn embed_sections(
        &self,
        html: &str,
        max_keywords: usize,
        material_dir: Option<&Path>,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> SectionEmbedding {
        let mut document = Document::parse(html);
        let slots = document.slots();
        let mut result = SectionEmbedding::default();

        if slots.is_empty() {
            debug!(sections = document.sections().len(), "no insertion slots");
            result.html = html.to_string();
            return result;
        }

        info!(sections = document.sections().len(), ?slots, "embedding section images");

        for position in slots {
            let Some(section) = document.section(position).cloned() else {
                continue;
            };

            let mut asset = match self
                .resolve_slot(&section, max_keywords, material_dir, ctx)
                .await
            {
                Ok(asset) => asset,
                Err(e) => {
                    warn!(slot = position, error = %e, "no image for slot, skipping");
                    progress.slot_skipped(position, &e.to_string());
                    result.skipped.push(position);
                    continue;
                }
            };

            match self.uploader.upload_content_image(&asset.local_path).await {
                Ok(url) => {
                    document.insert_after_heading(position, &image_block(&url));
                    progress.slot_filled(position, asset.provider());
                    asset.hosted_url = Some(url);
                }
                Err(e) => {
                    warn!(slot = position, error = %e, "upload failed, skipping slot");
                    progress.slot_skipped(position, &e.to_string());
                    result.skipped.push(position);
                }
            }
            result.images.push(asset);
        }

        result.html = document.to_html();
        result
    }

    async fn resolve_slot(
        &self,
        section: &Section,
        max_keywords: usize,
        material_dir: Option<&Path>,
        ctx: &mut RunContext,
    ) -> Result<ImageAsset> {
        if let Some(dir) = material_dir {
            let request = ImageRequest::Directory {
                dir: dir.to_path_buf(),
            };
            match self.chain.resolve(&request, &mut ctx.used_images).await {
                Ok(asset) => return Ok(asset),
                Err(e @ IllustraError::MaterialDirectoryInvalid { .. }) => return Err(e),
                Err(e) => debug!(slot = section.position, error = %e, "material exhausted, searching"),
            }
        }

        let terms = self.extractor.extract_section(
            &section.heading,
            &section.body,
            max_keywords,
            &mut ctx.used_keywords,
        );
        self.chain
            .resolve(&ImageRequest::search(&terms), &mut ctx.used_images)
            .await
    }

    /// Upload every local `<img src>` and point it at the hosted copy.
    ///
    /// Remote and `data:` references are never touched, so a second pass over
    /// the output is a no-op. Relative paths resolve against `base_dir`.
    #[instrument(skip_all, fields(base_dir = %base_dir.display()))]
    pub async fn rewrite_inline(&self, html: &str, base_dir: &Path) -> InlineRewrite {
        let mut replaced = HashMap::new();

        for src in local_image_sources(html) {
            let path = resolve_local(base_dir, &src);
            if !path.is_file() {
                warn!(%src, path = %path.display(), "inline image not found, leaving as is");
                continue;
            }

            match self.uploader.upload_content_image(&path).await {
                Ok(url) => {
                    debug!(%src, %url, "inline image uploaded");
                    replaced.insert(src, url);
                }
                Err(e) => warn!(%src, error = %e, "inline image upload failed, leaving as is"),
            }
        }

        if !replaced.is_empty() {
            info!(count = replaced.len(), "inline images rewritten");
        }

        InlineRewrite {
            html: rewrite_sources(html, &replaced),
            replaced,
        }
    }
}

fn resolve_local(base_dir: &Path, src: &str) -> PathBuf {
    let src = src.strip_prefix("file://").unwrap_or(src);
    let path = Path::new(src);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use illustra_shared::{ImageSource, UsedImageSet};
    use illustra_sources::ImageProvider;

    use crate::pipeline::SilentProgress;

    /// Hands out `https://cdn.test/<n>` URLs and records what it was given.
    #[derive(Default)]
    struct RecordingUploader {
        calls: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl Uploader for RecordingUploader {
        async fn upload_content_image(&self, path: &Path) -> Result<String> {
            if self.fail {
                return Err(IllustraError::upload_rejected("errcode 45009"));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(path.to_path_buf());
            Ok(format!("https://cdn.test/{}", calls.len()))
        }

        async fn upload_cover(&self, _path: &Path) -> Result<String> {
            Ok("MEDIA".into())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Yields a fresh fake asset per phrase.
    struct PhraseProvider;

    #[async_trait]
    impl ImageProvider for PhraseProvider {
        fn supports(&self, request: &ImageRequest) -> bool {
            matches!(request, ImageRequest::Search { .. })
        }

        async fn try_resolve(
            &self,
            request: &ImageRequest,
            _used: &UsedImageSet,
        ) -> Result<Option<ImageAsset>> {
            let ImageRequest::Search { phrase } = request else {
                return Ok(None);
            };
            Ok(Some(ImageAsset {
                local_path: format!("/tmp/{phrase}.jpg").into(),
                source: ImageSource::Downloaded {
                    provider: "phrase".into(),
                },
                identity: phrase.clone(),
                hosted_url: None,
            }))
        }

        fn name(&self) -> &str {
            "phrase"
        }
    }

    fn article(sections: usize) -> String {
        let topics = ["rust", "ocean", "mountain", "coffee", "garden", "bridge", "forest"];
        let mut html = String::from("<h1>Guide</h1>");
        for topic in topics.iter().cycle().take(sections) {
            html.push_str(&format!("<h2>{topic} basics</h2><p>{topic} {topic} details</p>"));
        }
        html
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("illustra-embed-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn fills_both_slots_of_long_article() {
        let extractor = KeywordExtractor::default();
        let chain = ProviderChain::new(vec![Box::new(PhraseProvider)]);
        let uploader = RecordingUploader::default();
        let embedder = ContentEmbedder::new(&extractor, &chain, &uploader);

        let mut ctx = RunContext::new();
        let result = embedder
            .embed_sections(&article(6), 3, None, &mut ctx, &SilentProgress)
            .await;

        assert_eq!(result.inserted(), 2);
        assert!(result.skipped.is_empty());
        assert_eq!(result.html.matches("text-align:center").count(), 2);

        let sections = illustra_content::split(&result.html);
        assert!(sections[1].body.contains("https://cdn.test/1"));
        assert!(sections[3].body.contains("https://cdn.test/2"));
        assert!(!sections[0].body.contains("<img"));
    }

    #[tokio::test]
    async fn short_article_is_unchanged() {
        let extractor = KeywordExtractor::default();
        let chain = ProviderChain::new(vec![Box::new(PhraseProvider)]);
        let uploader = RecordingUploader::default();
        let embedder = ContentEmbedder::new(&extractor, &chain, &uploader);

        let html = article(2);
        let result = embedder
            .embed_sections(&html, 3, None, &mut RunContext::new(), &SilentProgress)
            .await;
        assert_eq!(result.html, html);
        assert!(result.images.is_empty());
    }

    #[tokio::test]
    async fn failed_slots_are_skipped_not_fatal() {
        let extractor = KeywordExtractor::default();
        let chain = ProviderChain::default();
        let uploader = RecordingUploader::default();
        let embedder = ContentEmbedder::new(&extractor, &chain, &uploader);

        let html = article(5);
        let result = embedder
            .embed_sections(&html, 3, None, &mut RunContext::new(), &SilentProgress)
            .await;
        assert_eq!(result.skipped, vec![1, 3]);
        assert_eq!(result.html, html);
    }

    #[tokio::test]
    async fn upload_failure_keeps_asset_for_cleanup() {
        let extractor = KeywordExtractor::default();
        let chain = ProviderChain::new(vec![Box::new(PhraseProvider)]);
        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        let embedder = ContentEmbedder::new(&extractor, &chain, &uploader);

        let result = embedder
            .embed_sections(&article(3), 3, None, &mut RunContext::new(), &SilentProgress)
            .await;
        assert_eq!(result.images.len(), 1);
        assert_eq!(result.inserted(), 0);
        assert_eq!(result.skipped, vec![1]);
    }

    #[tokio::test]
    async fn inline_rewrite_uploads_local_images_once() {
        let dir = temp_dir();
        std::fs::create_dir_all(dir.join("img")).unwrap();
        std::fs::write(dir.join("img/a.png"), b"png").unwrap();

        let extractor = KeywordExtractor::default();
        let chain = ProviderChain::default();
        let uploader = RecordingUploader::default();
        let embedder = ContentEmbedder::new(&extractor, &chain, &uploader);

        let html = r#"<p><img src="img/a.png" alt="A"></p><p><img class="x" src="img/a.png"></p><img src="https://remote/b.png"><img src="missing.png">"#;
        let first = embedder.rewrite_inline(html, &dir).await;

        assert_eq!(uploader.calls.lock().unwrap().len(), 1);
        assert_eq!(first.replaced.len(), 1);
        assert_eq!(
            first.html,
            r#"<p><img src="https://cdn.test/1" alt="A"></p><p><img class="x" src="https://cdn.test/1"></p><img src="https://remote/b.png"><img src="missing.png">"#
        );

        // Only the missing file is still local; a second pass changes nothing.
        let second = embedder.rewrite_inline(&first.html, &dir).await;
        assert_eq!(second.html, first.html);
        assert!(second.replaced.is_empty());
        assert_eq!(uploader.calls.lock().unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn local_paths_resolve_against_base_dir() {
        let base = Path::new("/articles/post");
        assert_eq!(resolve_local(base, "img/a.png"), PathBuf::from("/articles/post/img/a.png"));
        assert_eq!(resolve_local(base, "/abs/b.png"), PathBuf::from("/abs/b.png"));
        assert_eq!(resolve_local(base, "file:///abs/c.png"), PathBuf::from("/abs/c.png"));
    }
}
