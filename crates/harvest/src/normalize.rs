// ABOUTME: Document normalization: title and content resolution, metadata and link extraction.
// ABOUTME: Turns a parsed page plus its resolved fields into title, cleaned content, metadata and absolute links.

//! Document normalization.
//!
//! Resolution order:
//! - title: configured `title` field, then the document's `<title>`, then empty.
//! - content: configured `content` field, then all visible body text, then empty;
//!   the result is always passed through [`clean_text`].
//!
//! Metadata collects `<meta name|property=.. content=..>` pairs (last write
//! wins) and the last JSON-LD block that parses, under [`STRUCTURED_DATA_KEY`].
//! Malformed JSON-LD is skipped.
//!
//! Full text keeps block boundaries: the first `main`, `article` or
//! `div.content` region (else the body), one cleaned line per block.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::dom::text::{clean_text, element_text, visible_text};
use crate::record::Metadata;

/// Metadata key holding the parsed JSON-LD blob.
pub const STRUCTURED_DATA_KEY: &str = "structured_data";

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_static("title"));
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_static("body"));
static META_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_static("meta[content]"));
static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_static("script[type]"));
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_static("a[href]"));
static MAIN_REGION_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["main", "article", "div.content"]
        .into_iter()
        .map(parse_static)
        .collect()
});

fn parse_static(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// The normalized parts of a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPage {
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub links: BTreeSet<String>,
    pub full_text: String,
}

/// Normalizes a parsed document.
///
/// `fields` are the already-resolved field values; only `title` and `content`
/// are consulted. Links are resolved against `page_url`; with no base URL or
/// with `extract_links` off the link set is empty.
pub fn normalize(
    doc: &Html,
    fields: &BTreeMap<String, String>,
    page_url: Option<&Url>,
    extract_links: bool,
) -> NormalizedPage {
    let title = non_empty_field(fields, "title")
        .map(str::to_string)
        .unwrap_or_else(|| document_title(doc));

    let raw_content = non_empty_field(fields, "content")
        .map(str::to_string)
        .unwrap_or_else(|| body_text(doc));

    let links = match page_url {
        Some(base) if extract_links => extract_links_from(doc, base),
        _ => BTreeSet::new(),
    };

    NormalizedPage {
        title,
        content: clean_text(&raw_content),
        metadata: extract_metadata(doc),
        links,
        full_text: main_text(doc),
    }
}

fn non_empty_field<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Text of the document's own `<title>`, or empty.
pub fn document_title(doc: &Html) -> String {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// All visible body text with block boundaries as newlines, or empty.
pub fn body_text(doc: &Html) -> String {
    doc.select(&BODY_SELECTOR)
        .next()
        .map(visible_text)
        .unwrap_or_default()
}

/// Text of the main content region, one cleaned non-empty line per block.
pub fn main_text(doc: &Html) -> String {
    let region = MAIN_REGION_SELECTORS
        .iter()
        .find_map(|selector| doc.select(selector).next())
        .or_else(|| doc.select(&BODY_SELECTOR).next());

    let Some(region) = region else {
        return String::new();
    };
    visible_text(region)
        .lines()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collects meta-tag pairs and the embedded JSON-LD blob.
pub fn extract_metadata(doc: &Html) -> Metadata {
    let mut metadata = Metadata::new();

    for meta in doc.select(&META_SELECTOR) {
        let el = meta.value();
        let name = el
            .attr("name")
            .filter(|n| !n.is_empty())
            .or_else(|| el.attr("property"))
            .filter(|n| !n.is_empty());
        let content = el.attr("content").filter(|c| !c.is_empty());
        if let (Some(name), Some(content)) = (name, content) {
            metadata.insert(
                name.to_string(),
                serde_json::Value::String(content.to_string()),
            );
        }
    }

    let json_ld = doc.select(&SCRIPT_SELECTOR).filter(|script| {
        script
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
    });
    for script in json_ld {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => {
                metadata.insert(STRUCTURED_DATA_KEY.to_string(), value);
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed JSON-LD block");
            }
        }
    }

    metadata
}

/// Resolves every hyperlink against `base`, keeping unique http(s) URLs.
pub fn extract_links_from(doc: &Html, base: &Url) -> BTreeSet<String> {
    doc.select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}
