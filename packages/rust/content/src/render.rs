//! Markdown → HTML rendering behind the [`MarkdownRenderer`] seam.

use tracing::warn;

use illustra_shared::Result;

/// Turns raw Markdown into HTML.
pub trait MarkdownRenderer: Send + Sync {
    /// Render `markdown` to HTML.
    fn render(&self, markdown: &str) -> Result<String>;

    /// Human-readable renderer name for tracing.
    fn name(&self) -> &str;
}

/// CommonMark renderer with tables, footnotes and strikethrough enabled.
#[cfg(feature = "commonmark")]
pub struct CommonMarkRenderer;

#[cfg(feature = "commonmark")]
impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        use pulldown_cmark::{Options, Parser, html};

        let options =
            Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
        let parser = Parser::new_ext(markdown, options);

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }

    fn name(&self) -> &str {
        "commonmark"
    }
}

/// Trivial transform: every newline-delimited line becomes one `<p>`.
pub struct ParagraphRenderer;

impl MarkdownRenderer for ParagraphRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        Ok(wrap_lines(markdown))
    }

    fn name(&self) -> &str {
        "paragraph"
    }
}

/// The best renderer compiled into this build.
pub fn default_renderer() -> Box<dyn MarkdownRenderer> {
    #[cfg(feature = "commonmark")]
    {
        Box::new(CommonMarkRenderer)
    }
    #[cfg(not(feature = "commonmark"))]
    {
        Box::new(ParagraphRenderer)
    }
}

/// Render with `renderer`, degrading to [`ParagraphRenderer`] if it fails.
pub fn render_markdown(renderer: &dyn MarkdownRenderer, markdown: &str) -> String {
    match renderer.render(markdown) {
        Ok(html) => html,
        Err(e) => {
            warn!(renderer = renderer.name(), error = %e, "markdown renderer failed, wrapping lines in <p>");
            wrap_lines(markdown)
        }
    }
}

fn wrap_lines(text: &str) -> String {
    format!("<p>{}</p>", text.lines().collect::<Vec<_>>().join("</p><p>"))
}
