//! Weighted keyword extraction for image search queries.
//!
//! Terms are scored by frequency with boosts for the title (or section
//! heading) and the first paragraph, then mapped through a bilingual
//! [`TranslationTable`] into English search phrases. A run-scoped
//! [`UsedKeywordSet`] guarantees that no source term feeds two queries.

mod stopwords;
mod tables;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};

use illustra_shared::{Keyword, UsedKeywordSet, is_cjk_ideograph};

pub use tables::{TranslationTable, TranslationTables};

/// Query used when an article yields no usable terms.
pub const ARTICLE_FALLBACK_PHRASE: &str = "abstract concept art";

/// Query used when a section yields no usable terms.
pub const SECTION_FALLBACK_PHRASE: &str = "modern concept design";

/// Tokens shorter than this (in chars) are discarded.
const MIN_TOKEN_CHARS: usize = 2;

const ARTICLE_TITLE_BOOST: u32 = 5;
const SECTION_TITLE_BOOST: u32 = 3;
const FIRST_PARAGRAPH_BOOST: u32 = 2;

/// Candidate pool size as a multiple of the requested keyword count.
const POOL_FACTOR: usize = 3;

// ---------------------------------------------------------------------------
// Scoring input
// ---------------------------------------------------------------------------

/// Which extraction variant is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Whole-article extraction (cover image).
    Article,
    /// Per-section extraction (body images).
    Section,
}

impl Scope {
    fn title_boost(self) -> u32 {
        match self {
            Self::Article => ARTICLE_TITLE_BOOST,
            Self::Section => SECTION_TITLE_BOOST,
        }
    }

    fn fallback(self) -> &'static str {
        match self {
            Self::Article => ARTICLE_FALLBACK_PHRASE,
            Self::Section => SECTION_FALLBACK_PHRASE,
        }
    }
}

/// Plain-text view of the material being scored.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub scope: Scope,
    /// Markup-free text.
    pub text: String,
    /// Title line (article) or the section's own heading.
    pub title: Option<String>,
    /// Second non-empty block; only boosted at article scope.
    pub first_paragraph: Option<String>,
}

impl ScoringInput {
    /// Build the article-level view of Markdown or HTML content.
    pub fn article(content: &str) -> Self {
        let title = markdown_title(content).or_else(|| html_title(content));
        let text = strip_markup(content);
        let first_paragraph = text_blocks(&text).nth(1).map(str::to_string);
        Self {
            scope: Scope::Article,
            text,
            title,
            first_paragraph,
        }
    }

    /// Build the section-level view from a heading and its body markup.
    pub fn section(heading: &str, body: &str) -> Self {
        let title = strip_markup(heading).trim().to_string();
        let text = format!("{title}\n\n{}", strip_markup(body));
        Self {
            scope: Scope::Section,
            text,
            title: (!title.is_empty()).then_some(title),
            first_paragraph: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Keyword extractor bound to a pair of translation tables.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    tables: TranslationTables,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(TranslationTables::builtin())
    }
}

impl KeywordExtractor {
    pub fn new(tables: TranslationTables) -> Self {
        Self { tables }
    }

    /// Extract up to `max_keywords` search terms for the whole article.
    ///
    /// Never fails: returns [`ARTICLE_FALLBACK_PHRASE`] when nothing usable is found.
    pub fn extract_article(
        &self,
        content: &str,
        max_keywords: usize,
        used: &mut UsedKeywordSet,
    ) -> Vec<String> {
        self.extract(&ScoringInput::article(content), max_keywords, used)
    }

    /// Extract up to `max_keywords` search terms for one section.
    ///
    /// Never fails: returns [`SECTION_FALLBACK_PHRASE`] when nothing usable is found.
    pub fn extract_section(
        &self,
        heading: &str,
        body: &str,
        max_keywords: usize,
        used: &mut UsedKeywordSet,
    ) -> Vec<String> {
        self.extract(&ScoringInput::section(heading, body), max_keywords, used)
    }

    /// Select terms from a prepared input, recording consumed tokens in `used`.
    #[instrument(skip_all, fields(scope = ?input.scope, max = max_keywords))]
    pub fn extract(
        &self,
        input: &ScoringInput,
        max_keywords: usize,
        used: &mut UsedKeywordSet,
    ) -> Vec<String> {
        let table = match input.scope {
            Scope::Article => &self.tables.cover,
            Scope::Section => &self.tables.section,
        };

        let ranked = rank(input);
        let pool = ranked.iter().take(max_keywords.saturating_mul(POOL_FACTOR));

        let mut terms: Vec<String> = Vec::new();
        let mut consumed: Vec<&str> = Vec::new();

        for keyword in pool {
            if terms.len() >= max_keywords {
                break;
            }
            if used.contains(&keyword.term) {
                continue;
            }

            // Mapped, Latin and other raw tokens all consume the source term.
            let emitted = table
                .lookup(&keyword.term)
                .unwrap_or(keyword.term.as_str());
            if !terms.iter().any(|t| t == emitted) {
                terms.push(emitted.to_string());
            }
            consumed.push(&keyword.term);
        }

        for term in consumed {
            used.insert(term);
        }

        if terms.is_empty() {
            debug!(fallback = input.scope.fallback(), "no usable keywords, using fallback");
            return vec![input.scope.fallback().to_string()];
        }

        debug!(?terms, "keywords extracted");
        terms
    }
}

/// Score every token in `input`, highest first; ties keep first-occurrence order.
pub fn rank(input: &ScoringInput) -> Vec<Keyword> {
    let mut order: Vec<String> = Vec::new();
    let mut scores: HashMap<String, u32> = HashMap::new();

    let mut add = |token: String, amount: u32| {
        let score = scores.entry(token.clone()).or_insert_with(|| {
            order.push(token);
            0
        });
        *score += amount;
    };

    for token in tokenize(&input.text) {
        add(token, 1);
    }

    if let Some(title) = &input.title {
        for token in tokenize(title) {
            add(token, input.scope.title_boost());
        }
    }

    if input.scope == Scope::Article {
        if let Some(paragraph) = &input.first_paragraph {
            for token in tokenize(paragraph) {
                add(token, FIRST_PARAGRAPH_BOOST);
            }
        }
    }

    let mut ranked: Vec<Keyword> = order
        .into_iter()
        .map(|term| {
            let weight = scores.get(&term).copied().unwrap_or_default();
            Keyword::new(term, weight)
        })
        .collect();
    ranked.sort_by(|a, b| b.weight.cmp(&a.weight));
    ranked
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Split text into lower-cased candidate tokens.
///
/// Anything that is not a word character or CJK ideograph becomes a separator.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || is_cjk_ideograph(c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !stopwords::is_stop_word(t))
        .collect()
}

/// Remove tags and decode entities, keeping block boundaries as blank lines.
pub fn strip_markup(content: &str) -> String {
    static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)</(?:p|h[1-6]|li|div|blockquote|pre|tr|section|article)\s*>|<br\s*/?>")
            .expect("valid regex")
    });

    let spaced = BLOCK_END_RE.replace_all(content, "$0\n\n");
    Html::parse_fragment(&spaced)
        .root_element()
        .text()
        .collect::<String>()
}

/// Non-empty blank-line-separated blocks.
fn text_blocks(text: &str) -> impl Iterator<Item = &str> {
    static BLANK_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

    BLANK_LINE_RE
        .split(text)
        .map(str::trim)
        .filter(|b| !b.is_empty())
}

/// The first `# heading` line of Markdown text.
fn markdown_title(content: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+)$").expect("valid regex"));

    H1_RE
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// The text of the first `<h1>` in HTML content.
fn html_title(content: &str) -> Option<String> {
    static HTML_H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1\s*>").expect("valid regex"));

    HTML_H1_RE
        .captures(content)
        .map(|c| strip_markup(&c[1]).trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> KeywordExtractor {
        KeywordExtractor::default()
    }

    #[test]
    fn dominant_title_term_maps_first() {
        let content = "# 人工智能\n\n人工智能 正在 改变 世界\n\n企业 拥抱 人工智能";
        let mut used = UsedKeywordSet::new();
        let terms = extractor().extract_article(content, 5, &mut used);
        assert_eq!(terms[0], "artificial intelligence technology");
        assert!(used.contains("人工智能"));
    }

    #[test]
    fn html_h1_counts_as_title() {
        let html = "<h1>Rust</h1><p>Ownership and borrowing explained.</p><p>Lifetimes too.</p>";
        let ranked = rank(&ScoringInput::article(html));
        assert_eq!(ranked[0].term, "rust");
        // 1 occurrence + 5 title boost
        assert_eq!(ranked[0].weight, 6);
    }

    #[test]
    fn first_paragraph_boost_applies_to_articles_only() {
        let content = "# Title\n\nGardening basics\n\nGardening advanced";
        let ranked = rank(&ScoringInput::article(content));
        let gardening = ranked.iter().find(|k| k.term == "gardening").unwrap();
        // two occurrences + first paragraph boost
        assert_eq!(gardening.weight, 4);

        let section = rank(&ScoringInput::section("<h2>Other</h2>", "<p>Gardening basics</p>"));
        let gardening = section.iter().find(|k| k.term == "gardening").unwrap();
        assert_eq!(gardening.weight, 1);
    }

    #[test]
    fn section_heading_boost() {
        let input = ScoringInput::section("<h2>Kubernetes</h2>", "<p>pods and services</p>");
        let ranked = rank(&input);
        assert_eq!(ranked[0].term, "kubernetes");
        // heading text counted once as text, plus +3
        assert_eq!(ranked[0].weight, 4);
    }

    #[test]
    fn never_reuses_terms_across_calls() {
        let ex = extractor();
        let mut used = UsedKeywordSet::new();
        used.insert("rust");

        let body = "<p>rust compiler rust borrow checker compiler</p>";
        let first = ex.extract_section("<h2>Rust</h2>", body, 2, &mut used);
        assert!(!first.iter().any(|t| t == "rust"));
        assert_eq!(first, vec!["compiler".to_string(), "borrow".to_string()]);
        assert!(used.contains("compiler"));
        assert!(used.contains("borrow"));

        let second = ex.extract_section("<h2>Rust</h2>", body, 2, &mut used);
        assert!(!second.iter().any(|t| first.contains(t)));
        assert_eq!(second, vec!["checker".to_string()]);
    }

    #[test]
    fn shared_phrase_emitted_once_but_both_tokens_consumed() {
        let mut used = UsedKeywordSet::new();
        let terms = extractor().extract_article("# AI 人工智能\n\nAI 人工智能", 3, &mut used);
        assert_eq!(
            terms
                .iter()
                .filter(|t| *t == "artificial intelligence technology")
                .count(),
            1
        );
        assert!(used.contains("ai"));
        assert!(used.contains("人工智能"));
    }

    #[test]
    fn fallback_is_not_recorded() {
        let ex = extractor();
        let mut used = UsedKeywordSet::new();
        assert_eq!(
            ex.extract_article("", 5, &mut used),
            vec![ARTICLE_FALLBACK_PHRASE.to_string()]
        );
        assert_eq!(
            ex.extract_section("<h2>的</h2>", "<p>a b c</p>", 3, &mut used),
            vec![SECTION_FALLBACK_PHRASE.to_string()]
        );
        assert!(used.is_empty());
    }

    #[test]
    fn respects_max_keywords() {
        let mut used = UsedKeywordSet::new();
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let terms = extractor().extract_article(text, 3, &mut used);
        assert_eq!(terms.len(), 3);
        assert_eq!(used.len(), 3);
    }

    #[test]
    fn oversized_budget_is_capped_by_candidates() {
        let mut used = UsedKeywordSet::new();
        let terms = extractor().extract_article("# Rust\n\nownership", usize::MAX, &mut used);
        assert!(!terms.is_empty());
        assert!(used.contains("rust"));
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn section_table_used_for_sections() {
        let mut used = UsedKeywordSet::new();
        let terms = extractor().extract_section("<h2>人工智能</h2>", "", 1, &mut used);
        assert_eq!(terms, vec!["ai robot interface".to_string()]);
    }

    #[test]
    fn custom_tables_replace_builtin_vocabulary() {
        let tables = TranslationTables::from_toml_str("[cover]\n\"ferris\" = \"orange crab\"").unwrap();
        let ex = KeywordExtractor::new(tables);
        let mut used = UsedKeywordSet::new();
        let terms = ex.extract_article("# Ferris\n\n人工智能", 2, &mut used);
        assert_eq!(terms, vec!["orange crab".to_string(), "人工智能".to_string()]);
    }

    #[test]
    fn tokenize_filters_short_and_stop_words() {
        let tokens = tokenize("The quick fox, a 的 数据!   x_y ok");
        assert_eq!(tokens, vec!["quick", "fox", "数据", "x_y", "ok"]);
    }

    #[test]
    fn strip_markup_keeps_block_boundaries() {
        let text = strip_markup("<p>one &amp; two</p><p>three</p>");
        let blocks: Vec<&str> = text_blocks(&text).collect();
        assert_eq!(blocks, vec!["one & two", "three"]);
    }
}
