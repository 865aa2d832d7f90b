// ABOUTME: Text collection over parsed DOM trees and content text cleaning.
// ABOUTME: Skips non-content nodes, keeps block boundaries as newlines, strips boilerplate phrases.

use aho_corasick::{AhoCorasick, MatchKind};
use ego_tree::iter::Edge;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Node};

/// Elements whose text is never visible page content.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Page chrome skipped by the full-body fallback.
const BOILERPLATE_TAGS: &[&str] = &["nav", "header", "footer"];

/// Elements that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "caption",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

/// Navigation phrases removed from cleaned content, matched case-insensitively.
const BOILERPLATE_PHRASES: [&str; 2] = ["skip to main content", "skip to navigation"];

static BOILERPLATE_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostFirst)
        .build(BOILERPLATE_PHRASES)
        .expect("boilerplate phrases are valid patterns")
});

/// Collapses runs of whitespace (including newlines) into single spaces and trims.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element with inter-element whitespace collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&collect_text(element, false))
}

/// All visible text under an element, one line per block-level element.
///
/// Page chrome (`nav`, `header`, `footer`) is skipped along with hidden elements.
pub fn visible_text(element: ElementRef<'_>) -> String {
    collect_text(element, true)
}

/// Cleans extracted content: collapses whitespace and removes skip-link boilerplate.
pub fn clean_text(text: &str) -> String {
    let collapsed = normalize_whitespace(text);
    let stripped =
        BOILERPLATE_MATCHER.replace_all(&collapsed, &[""; BOILERPLATE_PHRASES.len()]);
    normalize_whitespace(&stripped)
}

fn is_skipped(name: &str, skip_boilerplate: bool) -> bool {
    HIDDEN_TAGS.contains(&name) || (skip_boilerplate && BOILERPLATE_TAGS.contains(&name))
}

fn is_block(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

fn collect_text(root: ElementRef<'_>, skip_boilerplate: bool) -> String {
    let mut out = String::new();
    let mut pending_break = false;
    // depth inside a skipped subtree; 0 means text is collected
    let mut skip_depth = 0usize;

    for edge in root.traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) => {
                    if skip_depth > 0 || is_skipped(el.name(), skip_boilerplate) {
                        skip_depth += 1;
                    } else if is_block(el.name()) {
                        pending_break = true;
                    }
                }
                Node::Text(text) if skip_depth == 0 => {
                    let piece = text.trim();
                    if piece.is_empty() {
                        continue;
                    }
                    if !out.is_empty() {
                        out.push(if pending_break { '\n' } else { ' ' });
                    }
                    pending_break = false;
                    out.push_str(piece);
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    if skip_depth > 0 {
                        skip_depth -= 1;
                    } else if is_block(el.name()) {
                        pending_break = true;
                    }
                }
            }
        }
    }

    out
}
