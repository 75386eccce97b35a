//! Shared types, error model, and configuration for illustra.
//!
//! This crate is the foundation depended on by all other illustra crates.
//! It provides:
//! - [`IllustraError`], the unified error type
//! - Domain types ([`Keyword`], [`Section`], [`ImageAsset`], [`RunContext`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, KeywordsConfig, SearchConfig, UploadConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, read_secret_env,
};
pub use error::{IllustraError, Result};
pub use types::{
    ImageAsset, ImageRequest, ImageSource, Keyword, Language, RunContext, RunId, Section,
    UsedImageSet, UsedKeywordSet, is_cjk_ideograph, short_hash,
};
