//! Core domain types shared by the enrichment pipeline.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Keyword
// ---------------------------------------------------------------------------

/// Script family of a keyword term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cjk,
    Latin,
}

impl Language {
    /// Classify a term: anything containing a CJK ideograph is `Cjk`.
    pub fn of(term: &str) -> Self {
        if term.chars().any(is_cjk_ideograph) {
            Self::Cjk
        } else {
            Self::Latin
        }
    }
}

/// A scored candidate term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    /// Accumulated score (occurrences plus title/first-paragraph boosts).
    pub weight: u32,
    pub language: Language,
}

impl Keyword {
    pub fn new(term: impl Into<String>, weight: u32) -> Self {
        let term = term.into();
        let language = Language::of(&term);
        Self {
            term,
            weight,
            language,
        }
    }
}

/// True for characters in the CJK Unified Ideographs blocks.
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One heading-delimited slice of an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The full `<h2 ...>...</h2>` markup opening this section.
    pub heading: String,
    /// Markup between this heading and the next one (or end of document).
    pub body: String,
    /// Zero-based position among the document's sections.
    pub position: usize,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// What an image provider is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRequest {
    /// Keyword search mode.
    Search { phrase: String },
    /// Pick an unused file from a user-curated material directory.
    Directory { dir: PathBuf },
}

impl ImageRequest {
    /// Build a search request from extracted keyword terms.
    pub fn search(terms: &[String]) -> Self {
        Self::Search {
            phrase: terms.join(" "),
        }
    }
}

impl fmt::Display for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search { phrase } => write!(f, "search \"{phrase}\""),
            Self::Directory { dir } => write!(f, "material directory {}", dir.display()),
        }
    }
}

/// Where an [`ImageAsset`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// A cover path given explicitly by the user.
    UserSupplied,
    /// A file from the material directory.
    MaterialDirectory,
    /// Bytes fetched from a network provider and written to local storage.
    Downloaded { provider: String },
}

/// A local image file plus its provenance and (once uploaded) its hosted reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub local_path: PathBuf,
    pub source: ImageSource,
    /// Dedup key recorded in [`UsedImageSet`].
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_url: Option<String>,
}

impl ImageAsset {
    /// Provider name for logging.
    pub fn provider(&self) -> &str {
        match &self.source {
            ImageSource::UserSupplied => "user",
            ImageSource::MaterialDirectory => "material",
            ImageSource::Downloaded { provider } => provider,
        }
    }

    /// Downloaded files are cache artifacts owned by the run and must be deleted after publish.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.source, ImageSource::Downloaded { .. })
    }

    /// A user-supplied image (never deduplicated, never deleted).
    pub fn user_supplied(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            local_path: path.to_path_buf(),
            source: ImageSource::UserSupplied,
            identity: path.display().to_string(),
            hosted_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Run-scoped dedup sets
// ---------------------------------------------------------------------------

/// Raw source terms already consumed in this run.
#[derive(Debug, Clone, Default)]
pub struct UsedKeywordSet(HashSet<String>);

impl UsedKeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.0.contains(term)
    }

    /// Record a term; returns `false` if it was already present.
    pub fn insert(&mut self, term: impl Into<String>) -> bool {
        self.0.insert(term.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Image identities already selected in this run.
#[derive(Debug, Clone, Default)]
pub struct UsedImageSet(HashSet<String>);

impl UsedImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    pub fn insert(&mut self, identity: impl Into<String>) -> bool {
        self.0.insert(identity.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// State owned by a single pipeline invocation and threaded through every call.
///
/// Constructed fresh per run; nothing here outlives the run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub run_id: RunId,
    pub used_keywords: UsedKeywordSet,
    pub used_images: UsedImageSet,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// First 8 hex chars of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{digest:x}")[..8].to_string()
}
