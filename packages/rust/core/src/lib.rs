//! Enrichment pipeline for illustra.
//!
//! Ties keyword extraction, image providers and the upload collaborator
//! together: resolve a cover, illustrate chosen sections, and rewrite local
//! inline images to hosted URLs.

pub mod embed;
pub mod pipeline;
pub mod upload;

pub use embed::{ContentEmbedder, InlineRewrite, SectionEmbedding};
pub use pipeline::{
    EnrichRequest, Pipeline, ProgressReporter, RunConfig, RunOutcome, SilentProgress, build_chain,
};
pub use upload::{Uploader, WeChatUploader};
