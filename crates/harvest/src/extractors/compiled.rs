// ABOUTME: Selector configurations compiled once into reusable selector lists.
// ABOUTME: A compiled set is owned by the scraper or batch that built it and dies with it.

//! Compiled field selectors.
//!
//! A [`SelectorConfig`] is applied to every page of a batch, so its
//! alternatives are parsed once into a [`CompiledSelectors`] held by whoever
//! applies it. A scraper keeps one for its default configuration; a custom
//! configuration is compiled per call or per batch and dropped afterwards.
//! Alternatives that fail to parse are logged and left out.

use std::collections::BTreeMap;

use scraper::{Html, Selector};

use crate::dom::text::element_text;
use crate::extractors::select::{FieldSelector, SelectorConfig};

/// Parses one alternative; `None` when it is not valid CSS.
pub fn compile_alternative(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(err) => {
            tracing::debug!(selector = css, error = ?err, "ignoring invalid selector");
            None
        }
    }
}

/// The valid alternatives of one field, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct CompiledField {
    alternatives: Vec<Selector>,
}

impl CompiledField {
    pub fn compile(field: &FieldSelector) -> Self {
        Self {
            alternatives: field
                .alternatives()
                .iter()
                .filter_map(|css| compile_alternative(css))
                .collect(),
        }
    }

    /// Number of alternatives that compiled.
    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Text of the first element matched by the first matching alternative, or `""`.
    pub fn extract(&self, doc: &Html) -> String {
        self.alternatives
            .iter()
            .find_map(|selector| doc.select(selector).next())
            .map(element_text)
            .unwrap_or_default()
    }
}

/// Every field of a [`SelectorConfig`], compiled.
///
/// A field whose alternatives are all invalid is kept, so extraction still
/// reports it with an empty value.
#[derive(Debug, Clone, Default)]
pub struct CompiledSelectors {
    fields: Vec<(String, CompiledField)>,
}

impl CompiledSelectors {
    pub fn compile(config: &SelectorConfig) -> Self {
        Self {
            fields: config
                .iter()
                .map(|(name, field)| (name.to_string(), CompiledField::compile(field)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CompiledField> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, compiled)| compiled)
    }

    /// Number of fields, including ones with no valid alternative.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolves every field against a document.
    pub fn extract(&self, doc: &Html) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.extract(doc)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invalid_alternatives_are_left_out() {
        assert!(compile_alternative("div.main-content").is_some());
        assert!(compile_alternative("[[[invalid").is_none());

        let field = CompiledField::compile(&FieldSelector::new(["[[[invalid", "span.code", "p:::"]));
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn field_with_no_valid_alternative_is_kept() {
        let config = SelectorConfig::new()
            .with_field("code", "span.code")
            .with_field("broken", FieldSelector::new(["[[[invalid"]));
        let compiled = CompiledSelectors::compile(&config);

        assert_eq!(compiled.len(), 2);
        assert!(compiled.get("broken").unwrap().is_empty());

        let doc = Html::parse_document("<span class=\"code\">7 CFR 205</span>");
        let values = compiled.extract(&doc);
        assert_eq!(values["code"], "7 CFR 205");
        assert_eq!(values["broken"], "");
    }

    #[test]
    fn compiled_sets_are_independent() {
        let builtin = CompiledSelectors::compile(&SelectorConfig::builtin());
        let custom = CompiledSelectors::compile(&SelectorConfig::new().with_field("fee", "td.fee"));

        assert_eq!(builtin.len(), 5);
        assert_eq!(custom.len(), 1);
        assert!(builtin.get("fee").is_none());
        assert_eq!(builtin.get("regulation_code").unwrap().len(), 3);
    }
}
