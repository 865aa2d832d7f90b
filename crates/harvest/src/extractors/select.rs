// ABOUTME: Selector configuration types and first-match field extraction.
// ABOUTME: Each field holds an ordered list of CSS alternatives; the first alternative matching any element wins.

//! Selector-based field extraction.
//!
//! Key behaviors:
//! - A [`FieldSelector`] is an explicit ordered list of CSS selector alternatives.
//!   A comma-joined string is split at top-level commas only.
//! - Alternatives are tried left to right. Evaluation stops at the first
//!   alternative that matches an element, even if that element has no text:
//!   callers that want "first non-empty" must order their alternatives so.
//! - The value is the matched element's text with whitespace collapsed.
//! - No match (or only invalid alternatives) yields an empty string.

use std::collections::BTreeMap;
use std::fmt;

use scraper::Html;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::extractors::compiled::{CompiledField, CompiledSelectors};

/// Builtin field selectors, used when the caller supplies none.
const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("title", "h1, h2.page-title, title"),
    (
        "content",
        "main, article, div.content, div.main-content, div#content",
    ),
    ("date", "time, span.date, span.last-modified, div.date"),
    ("author", "span.author, div.byline"),
    (
        "regulation_code",
        "span.code, div.citation, span.regulation-number",
    ),
];

/// An ordered list of CSS selector alternatives for one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSelector {
    alternatives: Vec<String>,
}

impl FieldSelector {
    /// Build from explicit alternatives; blank entries are dropped.
    pub fn new<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alternatives: alternatives
                .into_iter()
                .map(|s| s.into().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-joined selector string such as `"h1, h2.page-title, title"`.
    pub fn parse(expr: &str) -> Self {
        Self::new(split_alternatives(expr))
    }

    /// The alternatives in evaluation order.
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alternatives.join(", "))
    }
}

impl From<&str> for FieldSelector {
    fn from(expr: &str) -> Self {
        FieldSelector::parse(expr)
    }
}

/// Wire form: either a comma-joined string or a list of selectors.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldSelectorRepr {
    Joined(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for FieldSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match FieldSelectorRepr::deserialize(deserializer)? {
            FieldSelectorRepr::Joined(expr) => FieldSelector::parse(&expr),
            FieldSelectorRepr::List(list) => FieldSelector::new(list),
        })
    }
}

impl Serialize for FieldSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.alternatives.serialize(serializer)
    }
}

/// Mapping of field name to its selector alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorConfig {
    fields: BTreeMap<String, FieldSelector>,
}

impl SelectorConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// The builtin five-field configuration.
    pub fn builtin() -> Self {
        DEFAULT_FIELDS
            .iter()
            .fold(Self::new(), |cfg, (name, expr)| cfg.with_field(*name, *expr))
    }

    /// Add or replace a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, selector: impl Into<FieldSelector>) -> Self {
        self.insert(name, selector);
        self
    }

    /// Add or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, selector: impl Into<FieldSelector>) {
        self.fields.insert(name.into(), selector.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldSelector> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSelector)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<K, V> FromIterator<(K, V)> for SelectorConfig
where
    K: Into<String>,
    V: Into<FieldSelector>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |cfg, (name, sel)| cfg.with_field(name, sel))
    }
}

/// Splits a selector list at top-level commas.
///
/// Commas nested in `()`, `[]` or quotes belong to their alternative, so
/// `":is(h1, h2), a[title='x,y']"` yields two alternatives.
pub fn split_alternatives(expr: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in expr.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '(') | (None, '[') => {
                depth += 1;
                current.push(ch);
            }
            (None, ')') | (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, ',') if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    parts.push(current.trim().to_string());

    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Resolves one field: text of the first element matched by the first matching alternative.
///
/// Returns an empty string when no alternative matches.
pub fn extract_field(doc: &Html, field: &FieldSelector) -> String {
    CompiledField::compile(field).extract(doc)
}

/// Resolves every configured field; the result has exactly the configured names as keys.
///
/// Compiles the configuration on each call. Callers applying one
/// configuration to many pages should hold a [`CompiledSelectors`] instead.
pub fn extract_fields(doc: &Html, config: &SelectorConfig) -> BTreeMap<String, String> {
    CompiledSelectors::compile(config).extract(doc)
}
