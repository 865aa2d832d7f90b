// ABOUTME: ScrapedRecord holding the structured output of one scraped page.
// ABOUTME: Includes the regulation-link filter and a truncated summary view for downstream consumers.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag-derived key/value pairs plus the optional `structured_data` blob.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Keywords that mark a link as likely pointing at regulatory material.
pub const DEFAULT_REGULATION_KEYWORDS: &[&str] = &[
    "regulation",
    "rule",
    "code",
    "statute",
    "law",
    "requirement",
    "compliance",
    "standard",
    "guideline",
];

/// Words that open a new key section of regulation text.
pub const DEFAULT_SECTION_KEYWORDS: &[&str] = &["section", "chapter", "requirement", "must", "shall"];

/// Modal words that turn a line about the subject into a requirement.
pub const DEFAULT_REQUIREMENT_MODALS: &[&str] = &["must", "shall", "require"];

/// Subject of the default requirement filter.
pub const DEFAULT_REQUIREMENT_SUBJECT: &str = "label";

/// The structured record produced for one successfully fetched page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    /// The URL that was requested.
    pub url: String,
    pub title: String,
    /// Cleaned body text, whitespace-collapsed.
    pub content: String,
    pub metadata: Metadata,
    /// Absolute http(s) links found on the page.
    pub links: BTreeSet<String>,
    /// One entry per configured field; empty string when nothing matched.
    pub extracted_fields: BTreeMap<String, String>,
    /// Main-region text, one cleaned line per block element.
    #[serde(default)]
    pub full_text: String,
}

impl ScrapedRecord {
    /// Returns the extracted value for a configured field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.extracted_fields.get(name).map(String::as_str)
    }

    /// Returns true if the page yielded neither title nor content.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// Builds a size-limited view of the record, stamped with the current time.
    pub fn summary(&self, limits: SummaryLimits) -> RecordSummary {
        RecordSummary {
            url: self.url.clone(),
            title: self.title.clone(),
            content: self.content.chars().take(limits.content_chars).collect(),
            metadata: self.metadata.clone(),
            links: self.links.iter().take(limits.max_links).cloned().collect(),
            key_sections: self.key_sections(DEFAULT_SECTION_KEYWORDS, limits.max_sections),
            key_requirements: self.key_requirements(
                DEFAULT_REQUIREMENT_SUBJECT,
                DEFAULT_REQUIREMENT_MODALS,
                limits.max_requirements,
            ),
            scraped_at: Utc::now(),
        }
    }

    /// Splits the main text into sections headed by keyword lines.
    ///
    /// A section starts at a line containing any keyword and runs up to the
    /// next such line. Lines before the first keyword line belong to no
    /// section. Matching is case-insensitive. At most `limit` sections.
    pub fn key_sections<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<String> {
        let keywords = lowercase_keywords(keywords);
        let mut sections = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in self.full_text.lines() {
            if sections.len() == limit {
                return sections;
            }
            if contains_any(line, &keywords) {
                if !current.is_empty() {
                    sections.push(current.join("\n"));
                }
                current = vec![line];
            } else if !current.is_empty() {
                current.push(line);
            }
        }
        if !current.is_empty() && sections.len() < limit {
            sections.push(current.join("\n"));
        }
        sections
    }

    /// Lines that mention `subject` together with any of `modals`.
    ///
    /// Matching is case-insensitive. At most `limit` lines.
    pub fn key_requirements<S: AsRef<str>>(
        &self,
        subject: &str,
        modals: &[S],
        limit: usize,
    ) -> Vec<String> {
        let subject = subject.to_lowercase();
        let modals = lowercase_keywords(modals);

        self.full_text
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                lower.contains(&subject) && modals.iter().any(|m| lower.contains(m.as_str()))
            })
            .take(limit)
            .map(str::to_string)
            .collect()
    }
}

/// Limits applied by [`ScrapedRecord::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    pub content_chars: usize,
    pub max_links: usize,
    pub max_sections: usize,
    pub max_requirements: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            content_chars: 5000,
            max_links: 50,
            max_sections: 10,
            max_requirements: 20,
        }
    }
}

/// A compact rendition of a record for display and hand-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub url: String,
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub links: Vec<String>,
    pub key_sections: Vec<String>,
    pub key_requirements: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Links of a record that look like regulatory material, using the default keywords.
pub fn find_regulation_links(record: &ScrapedRecord) -> Vec<String> {
    find_links_matching(record, DEFAULT_REGULATION_KEYWORDS)
}

/// Links whose lowercased form contains any of the given keywords.
///
/// Keywords are compared lowercased as well. No network access.
pub fn find_links_matching<S: AsRef<str>>(record: &ScrapedRecord, keywords: &[S]) -> Vec<String> {
    let keywords = lowercase_keywords(keywords);

    record
        .links
        .iter()
        .filter(|link| contains_any(link, &keywords))
        .cloned()
        .collect()
}

fn lowercase_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn contains_any(text: &str, lowercase_keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    lowercase_keywords.iter().any(|kw| lower.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record_with_links(links: &[&str]) -> ScrapedRecord {
        ScrapedRecord {
            url: "https://agr.example.gov/".to_string(),
            title: "Fertilizer".to_string(),
            content: "Program overview".to_string(),
            metadata: Metadata::new(),
            links: links.iter().map(|l| l.to_string()).collect(),
            extracted_fields: BTreeMap::new(),
            full_text: String::new(),
        }
    }

    fn record_with_text(lines: &[&str]) -> ScrapedRecord {
        ScrapedRecord {
            full_text: lines.join("\n"),
            ..Default::default()
        }
    }

    #[test]
    fn default_keywords_filter_links() {
        let record = record_with_links(&[
            "https://agr.example.gov/Rules/fertilizer",
            "https://agr.example.gov/about",
            "https://law.example.gov/statutes/35-12",
            "https://agr.example.gov/contact",
        ]);

        let links = find_regulation_links(&record);
        assert_eq!(
            links,
            vec![
                "https://agr.example.gov/Rules/fertilizer".to_string(),
                "https://law.example.gov/statutes/35-12".to_string(),
            ]
        );
    }

    #[test]
    fn custom_keywords_are_case_insensitive() {
        let record = record_with_links(&[
            "https://agr.example.gov/organic/omri-list",
            "https://agr.example.gov/pesticides",
        ]);

        assert_eq!(
            find_links_matching(&record, &["OMRI"]),
            vec!["https://agr.example.gov/organic/omri-list".to_string()]
        );
        assert!(find_links_matching(&record, &["hemp"]).is_empty());
    }

    #[test]
    fn summary_truncates_content_and_links() {
        let mut record = record_with_links(&[
            "https://a.example/1",
            "https://a.example/2",
            "https://a.example/3",
        ]);
        record.content = "ééééé-rest".to_string();

        let summary = record.summary(SummaryLimits {
            content_chars: 5,
            max_links: 2,
            ..Default::default()
        });

        assert_eq!(summary.content, "ééééé");
        assert_eq!(summary.links.len(), 2);
        assert_eq!(summary.url, record.url);
    }

    #[test]
    fn default_limits() {
        let limits = SummaryLimits::default();
        assert_eq!(limits.content_chars, 5000);
        assert_eq!(limits.max_links, 50);
        assert_eq!(limits.max_sections, 10);
        assert_eq!(limits.max_requirements, 20);
    }

    #[test]
    fn key_sections_start_at_keyword_lines() {
        let record = record_with_text(&[
            "Colorado Organic Program",
            "Certification",
            "Operations selling over $5,000 need certification.",
            "Apply through an accredited certifier.",
            "Inputs",
            "Products MUST be OMRI listed or equivalent.",
            "Contact us",
        ]);

        assert_eq!(
            record.key_sections(&["certification", "omri", "requirement", "must"], 10),
            vec![
                "Certification".to_string(),
                "Operations selling over $5,000 need certification.\nApply through an accredited certifier.\nInputs"
                    .to_string(),
                "Products MUST be OMRI listed or equivalent.\nContact us".to_string(),
            ]
        );
    }

    #[test]
    fn key_sections_respect_limit() {
        let record = record_with_text(&[
            "Section 1",
            "a",
            "Section 2",
            "b",
            "Section 3",
        ]);
        assert_eq!(
            record.key_sections(DEFAULT_SECTION_KEYWORDS, 2),
            vec!["Section 1\na".to_string(), "Section 2\nb".to_string()]
        );
        assert!(record.key_sections(&["chapter"], 10).is_empty());
        assert!(record_with_text(&[]).key_sections(DEFAULT_SECTION_KEYWORDS, 10).is_empty());
    }

    #[test]
    fn key_requirements_need_subject_and_modal() {
        let record = record_with_text(&[
            "Every Label must show the guaranteed analysis.",
            "Labels are reviewed yearly.",
            "Registrants shall renew by June 30.",
            "The label shall state net weight.",
            "Bulk product labeling requirements apply.",
        ]);

        assert_eq!(
            record.key_requirements(DEFAULT_REQUIREMENT_SUBJECT, DEFAULT_REQUIREMENT_MODALS, 20),
            vec![
                "Every Label must show the guaranteed analysis.".to_string(),
                "The label shall state net weight.".to_string(),
                "Bulk product labeling requirements apply.".to_string(),
            ]
        );
        assert_eq!(
            record
                .key_requirements("label", &["shall"], 1)
                .len(),
            1
        );
    }

    #[test]
    fn summary_carries_excerpts() {
        let record = record_with_text(&[
            "Intro",
            "Requirement: each label must list nutrients.",
            "Details follow.",
        ]);
        let summary = record.summary(SummaryLimits::default());
        assert_eq!(
            summary.key_sections,
            vec!["Requirement: each label must list nutrients.\nDetails follow.".to_string()]
        );
        assert_eq!(
            summary.key_requirements,
            vec!["Requirement: each label must list nutrients.".to_string()]
        );
    }

    #[test]
    fn serializes_links_as_array() {
        let record = record_with_links(&["https://a.example/x"]);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["links"], serde_json::json!(["https://a.example/x"]));
        assert_eq!(record.field("title"), None);
    }
}
