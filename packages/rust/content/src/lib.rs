//! Article content handling: loading, Markdown rendering, section splitting,
//! and inline image reference scanning.

mod document;
mod images;
mod render;

use std::path::Path;

use tracing::{debug, instrument};

use illustra_shared::{IllustraError, Result};

pub use document::{
    Document, MIN_SPLITTABLE_SECTIONS, image_block, insertion_slots, split,
};
pub use images::{image_sources, is_remote, local_image_sources, rewrite_sources};
#[cfg(feature = "commonmark")]
pub use render::CommonMarkRenderer;
pub use render::{MarkdownRenderer, ParagraphRenderer, default_renderer, render_markdown};

/// Read an article file as UTF-8, rendering `.md`/`.markdown` to HTML.
///
/// Plain text and pre-rendered HTML are returned verbatim.
#[instrument(skip(renderer), fields(path = %path.display()))]
pub fn load_content(path: &Path, renderer: &dyn MarkdownRenderer) -> Result<String> {
    if !path.is_file() {
        return Err(IllustraError::content_not_found(path, "file does not exist"));
    }

    let data = std::fs::read_to_string(path)
        .map_err(|e| IllustraError::content_not_found(path, e.to_string()))?;

    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"));

    if is_markdown {
        debug!(renderer = renderer.name(), "rendering markdown content");
        return Ok(render_markdown(renderer, &data));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("illustra-content-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_is_content_not_found() {
        let err = load_content(Path::new("/definitely/not/here.md"), &ParagraphRenderer).unwrap_err();
        assert!(matches!(err, IllustraError::ContentNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn markdown_is_rendered() {
        let dir = temp_dir();
        let path = dir.join("post.MD");
        std::fs::write(&path, "line one\nline two").unwrap();
        let html = load_content(&path, &ParagraphRenderer).unwrap();
        assert_eq!(html, "<p>line one</p><p>line two</p>");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn html_is_returned_verbatim() {
        let dir = temp_dir();
        let path = dir.join("post.html");
        std::fs::write(&path, "<h2>Already</h2><p>html</p>").unwrap();
        let html = load_content(&path, &ParagraphRenderer).unwrap();
        assert_eq!(html, "<h2>Already</h2><p>html</p>");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_utf8_is_content_not_found() {
        let dir = temp_dir();
        let path = dir.join("binary.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = load_content(&path, &ParagraphRenderer).unwrap_err();
        assert!(matches!(err, IllustraError::ContentNotFound { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
