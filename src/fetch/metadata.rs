//! Title/description extraction and HTML-to-text conversion.

use scraper::{Html, Selector};
use url::Url;

use crate::types::{AssistantError, SourceMetadata, SourceOrigin};

/// Placeholder title when nothing usable is found in the document.
pub const UNTITLED: &str = "Untitled Article";

/// Placeholder description when no meta description is present.
pub const NO_DESCRIPTION: &str = "No description available";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

/// Parses a fetched document for its title and description.
///
/// Title fallback chain: `og:title` meta tag, `meta[name=title]`, the
/// `<title>` element, then [`UNTITLED`]. Description: `og:description`,
/// `meta[name=description]`, then [`NO_DESCRIPTION`]. Both fields are
/// truncated by the [`SourceMetadata`] constructor.
pub fn extract_metadata(html: &str, url: &Url) -> SourceMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| meta_content(&document, "meta[name=\"title\"]"))
        .or_else(|| element_text(&document, "title"))
        .unwrap_or_else(|| UNTITLED.to_string());

    let description = meta_content(&document, "meta[property=\"og:description\"]")
        .or_else(|| meta_content(&document, "meta[name=\"description\"]"))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    SourceMetadata::new(title, description, SourceOrigin::Url(url.clone()))
}

/// Builds the placeholder record for a URL whose fetch or parse failed.
///
/// The failure text is embedded in the description so the batch can continue
/// while the user still sees what went wrong for this one source.
pub fn error_metadata(url: &Url, err: &AssistantError) -> SourceMetadata {
    SourceMetadata::new(
        UNTITLED,
        format!("Error fetching metadata: {}", err.message()),
        SourceOrigin::Url(url.clone()),
    )
}

/// Reduces an HTML document to readable text for chunking.
///
/// Block-level content elements are collected in document order and joined
/// with paragraph breaks, which lines up with the splitter's coarsest
/// separator. Documents without any recognized block elements fall back to
/// the whole-tree text.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let blocks = selector("p, h1, h2, h3, h4, h5, h6, li");

    let mut parts = Vec::new();
    for element in document.select(&blocks) {
        let text = collapse_whitespace(element.text());
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        collapse_whitespace(document.root_element().text())
    } else {
        parts.join("\n\n")
    }
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css);
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

fn element_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css);
    document
        .select(&sel)
        .next()
        .map(|el| collapse_whitespace(el.text()))
        .filter(|text| !text.is_empty())
}

fn collapse_whitespace<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    fragments
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
