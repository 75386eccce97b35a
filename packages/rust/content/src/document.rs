//! Heading-delimited document model.
//!
//! HTML content is split at `<h2>` boundaries into a preamble plus an ordered
//! list of [`Section`]s. Image blocks are inserted structurally at the start
//! of a section body and the document is re-serialized with [`Document::to_html`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use illustra_shared::Section;

static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2\b[^>]*>.*?</h2\s*>").expect("valid regex"));

/// Minimum section count for a document to be considered splittable.
pub const MIN_SPLITTABLE_SECTIONS: usize = 2;

/// Partition HTML into ordered `<h2>`-delimited sections.
///
/// Text before the first heading is not a section.
pub fn split(html: &str) -> Vec<Section> {
    Document::parse(html).sections
}

/// Section positions that receive a body image.
///
/// Spreads at most two images through the article while keeping the first
/// and last sections clear.
pub fn insertion_slots(section_count: usize) -> Vec<usize> {
    match section_count {
        n if n >= 5 => vec![1, 3],
        3 | 4 => vec![1],
        _ => Vec::new(),
    }
}

/// A parsed document: preamble followed by heading-delimited sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    preamble: String,
    sections: Vec<Section>,
    illustrated: HashSet<usize>,
}

impl Document {
    /// Parse HTML content. `Document::parse(html).to_html() == html`.
    pub fn parse(html: &str) -> Self {
        let headings: Vec<_> = H2_RE.find_iter(html).collect();

        let Some(first) = headings.first() else {
            return Self {
                preamble: html.to_string(),
                sections: Vec::new(),
                illustrated: HashSet::new(),
            };
        };

        let sections = headings
            .iter()
            .enumerate()
            .map(|(position, heading)| {
                let body_end = headings
                    .get(position + 1)
                    .map_or(html.len(), |next| next.start());
                Section {
                    heading: heading.as_str().to_string(),
                    body: html[heading.end()..body_end].to_string(),
                    position,
                }
            })
            .collect::<Vec<_>>();

        debug!(sections = sections.len(), "document split");

        Self {
            preamble: html[..first.start()].to_string(),
            sections,
            illustrated: HashSet::new(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, position: usize) -> Option<&Section> {
        self.sections.get(position)
    }

    /// Fewer than two sections means no body images.
    pub fn is_splittable(&self) -> bool {
        self.sections.len() >= MIN_SPLITTABLE_SECTIONS
    }

    /// Slots chosen for this document (empty when unsplittable).
    pub fn slots(&self) -> Vec<usize> {
        if !self.is_splittable() {
            return Vec::new();
        }
        insertion_slots(self.sections.len())
    }

    /// Place `block` immediately after the heading of section `position`.
    ///
    /// Each section accepts at most one image; returns `false` when the
    /// position is out of range or already illustrated.
    pub fn insert_after_heading(&mut self, position: usize, block: &str) -> bool {
        if self.illustrated.contains(&position) {
            return false;
        }
        let Some(section) = self.sections.get_mut(position) else {
            return false;
        };
        section.body.insert_str(0, block);
        self.illustrated.insert(position);
        true
    }

    /// Number of sections that received an image.
    pub fn illustrated_count(&self) -> usize {
        self.illustrated.len()
    }

    /// Serialize back to HTML.
    pub fn to_html(&self) -> String {
        let capacity = self.preamble.len()
            + self
                .sections
                .iter()
                .map(|s| s.heading.len() + s.body.len())
                .sum::<usize>();
        let mut out = String::with_capacity(capacity);
        out.push_str(&self.preamble);
        for section in &self.sections {
            out.push_str(&section.heading);
            out.push_str(&section.body);
        }
        out
    }
}

/// Centered image block inserted after a section heading.
pub fn image_block(url: &str) -> String {
    format!(
        "\n<p style=\"text-align:center;\"><img src=\"{url}\" style=\"max-width:100%;height:auto;\" /></p>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_sections(n: usize) -> String {
        let mut html = String::from("<h1>Title</h1><p>Intro</p>");
        for i in 0..n {
            html.push_str(&format!("<h2>Part {i}</h2><p>Body {i}</p>"));
        }
        html
    }

    #[test]
    fn slot_policy() {
        assert_eq!(insertion_slots(0), Vec::<usize>::new());
        assert_eq!(insertion_slots(2), Vec::<usize>::new());
        assert_eq!(insertion_slots(3), vec![1]);
        assert_eq!(insertion_slots(4), vec![1]);
        assert_eq!(insertion_slots(5), vec![1, 3]);
        assert_eq!(insertion_slots(12), vec![1, 3]);
    }

    #[test]
    fn split_excludes_preamble() {
        let sections = split(&doc_with_sections(3));
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, "<h2>Part 0</h2>");
        assert_eq!(sections[0].body, "<p>Body 0</p>");
        assert_eq!(sections[2].position, 2);
    }

    #[test]
    fn heading_attributes_and_case() {
        let html = "<p>x</p><H2 id=\"a\">One</H2>body<h2 class='b'>Two</h2>";
        let sections = split(html);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "<H2 id=\"a\">One</H2>");
        assert_eq!(sections[0].body, "body");
        assert_eq!(sections[1].body, "");
    }

    #[test]
    fn roundtrip_is_lossless() {
        for n in [0, 1, 2, 6] {
            let html = doc_with_sections(n);
            assert_eq!(Document::parse(&html).to_html(), html);
        }
    }

    #[test]
    fn unsplittable_documents_have_no_slots() {
        assert!(Document::parse("<p>no headings</p>").slots().is_empty());
        assert!(Document::parse(&doc_with_sections(1)).slots().is_empty());
        assert!(Document::parse(&doc_with_sections(2)).slots().is_empty());
        assert_eq!(Document::parse(&doc_with_sections(6)).slots(), vec![1, 3]);
    }

    #[test]
    fn insert_is_once_per_section() {
        let mut doc = Document::parse(&doc_with_sections(4));
        assert!(doc.insert_after_heading(1, "<img src=\"a\">"));
        assert!(!doc.insert_after_heading(1, "<img src=\"b\">"));
        assert!(!doc.insert_after_heading(9, "<img src=\"c\">"));
        assert_eq!(doc.illustrated_count(), 1);

        let html = doc.to_html();
        assert!(html.contains("<h2>Part 1</h2><img src=\"a\"><p>Body 1</p>"));
        assert!(!html.contains("src=\"b\""));
    }

    #[test]
    fn insertion_targets_the_right_heading_even_when_text_repeats() {
        let html = "<h2>Same</h2><p>a</p><h2>Same</h2><p>b</p><h2>Same</h2><p>c</p>";
        let mut doc = Document::parse(html);
        doc.insert_after_heading(1, "[IMG]");
        assert_eq!(
            doc.to_html(),
            "<h2>Same</h2><p>a</p><h2>Same</h2>[IMG]<p>b</p><h2>Same</h2><p>c</p>"
        );
    }

    #[test]
    fn image_block_is_centered() {
        let block = image_block("https://cdn.example.com/x.jpg");
        assert!(block.contains("text-align:center"));
        assert!(block.contains("src=\"https://cdn.example.com/x.jpg\""));
    }
}
