//! Inline `<img>` reference scanning and in-place `src` rewriting.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Captures: 1 = tag prefix, 2 = opening quote, 3 = src value, 4 = closing quote.
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*?\ssrc\s*=\s*)(["'])([^"']+)(["'])"#).expect("valid regex")
});

/// True for `http://`, `https://` and `data:` references.
pub fn is_remote(src: &str) -> bool {
    let lower = src.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Every `src` value of every `<img>` tag, in document order.
pub fn image_sources(html: &str) -> Vec<String> {
    IMG_SRC_RE
        .captures_iter(html)
        .map(|c| c[3].trim().to_string())
        .collect()
}

/// Distinct local (non-remote) `src` values, in first-seen order.
pub fn local_image_sources(html: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for src in image_sources(html) {
        if !is_remote(&src) && !seen.contains(&src) {
            seen.push(src);
        }
    }
    seen
}

/// Replace `src` values found in `replacements`, leaving the rest of each tag untouched.
pub fn rewrite_sources(html: &str, replacements: &HashMap<String, String>) -> String {
    if replacements.is_empty() {
        return html.to_string();
    }

    IMG_SRC_RE
        .replace_all(html, |caps: &Captures| {
            let src = caps[3].trim();
            match replacements.get(src) {
                Some(url) => format!("{}{}{url}{}", &caps[1], &caps[2], &caps[4]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
