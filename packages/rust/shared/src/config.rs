//! Application configuration for illustra.
//!
//! User config lives at `~/.illustra/illustra.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IllustraError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "illustra.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".illustra";

// ---------------------------------------------------------------------------
// Config structs (matching illustra.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Image search providers.
    #[serde(default)]
    pub search: SearchConfig,

    /// Image upload service.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Keyword translation tables.
    #[serde(default)]
    pub keywords: KeywordsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Insert images into article sections.
    #[serde(default = "default_true")]
    pub content_images: bool,

    /// Where downloaded images are written. Defaults to the content file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Keyword budget for the whole-article (cover) query.
    #[serde(default = "default_cover_keywords")]
    pub max_cover_keywords: usize,

    /// Keyword budget for each section query.
    #[serde(default = "default_section_keywords")]
    pub max_section_keywords: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            content_images: true,
            cache_dir: None,
            max_cover_keywords: default_cover_keywords(),
            max_section_keywords: default_section_keywords(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cover_keywords() -> usize {
    5
}
fn default_section_keywords() -> usize {
    3
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the primary provider's API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Primary search endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Base URL of the deterministic placeholder service.
    #[serde(default = "default_placeholder_endpoint")]
    pub placeholder_endpoint: String,

    /// Per-request timeout for search calls.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Results requested per search.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            endpoint: default_search_endpoint(),
            placeholder_endpoint: default_placeholder_endpoint(),
            timeout_secs: default_search_timeout(),
            per_page: default_per_page(),
        }
    }
}

fn default_search_key_env() -> String {
    "PEXELS_API_KEY".into()
}
fn default_search_endpoint() -> String {
    "https://api.pexels.com/v1/search".into()
}
fn default_placeholder_endpoint() -> String {
    "https://picsum.photos".into()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_per_page() -> u32 {
    15
}

/// `[upload]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Name of the env var holding the upload access token.
    #[serde(default = "default_token_env")]
    pub access_token_env: String,

    /// Base URL of the upload API.
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,

    /// Per-request timeout for uploads.
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            access_token_env: default_token_env(),
            endpoint: default_upload_endpoint(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

fn default_token_env() -> String {
    "WECHAT_MP_ACCESS_TOKEN".into()
}
fn default_upload_endpoint() -> String {
    "https://api.weixin.qq.com".into()
}
fn default_upload_timeout() -> u64 {
    30
}

/// `[keywords]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordsConfig {
    /// Optional TOML file replacing the built-in translation tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.illustra/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| IllustraError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.illustra/illustra.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IllustraError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| IllustraError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IllustraError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IllustraError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IllustraError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the env var named `var_name`; empty values count as missing.
pub fn read_secret_env(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("PEXELS_API_KEY"));
        assert!(toml_str.contains("WECHAT_MP_ACCESS_TOKEN"));
        assert!(!toml_str.contains("table_file"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_cover_keywords, 5);
        assert_eq!(parsed.defaults.max_section_keywords, 3);
        assert_eq!(parsed.search.timeout_secs, 15);
        assert_eq!(parsed.upload.timeout_secs, 30);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
content_images = false

[search]
endpoint = "http://localhost:9999/search"

[keywords]
table_file = "/etc/illustra/terms.toml"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.defaults.content_images);
        assert_eq!(config.defaults.max_section_keywords, 3);
        assert_eq!(config.search.endpoint, "http://localhost:9999/search");
        assert_eq!(config.search.placeholder_endpoint, "https://picsum.photos");
        assert_eq!(
            config.keywords.table_file.as_deref(),
            Some("/etc/illustra/terms.toml")
        );
    }

    #[test]
    fn missing_secret_env_is_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_secret_env("ILLUSTRA_TEST_NONEXISTENT_KEY_12345").is_none());
    }
}
