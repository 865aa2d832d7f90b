// ABOUTME: Source catalog mapping (jurisdiction, topic) to known government seed URLs.
// ABOUTME: Loads the builtin table from embedded JSON; federal sources are appended to every lookup.

//! Source catalog.
//!
//! Each jurisdiction lists agencies, and each agency maps topics to paths under
//! its base URL. A separate federal agency list applies to every jurisdiction.
//! Lookups are case-insensitive and accept either the jurisdiction's name
//! (`"colorado"`) or its two-letter code (`"CO"`).

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use url::Url;

/// Embedded JSON containing the builtin source table.
const BUILTIN_SOURCES_JSON: &str = include_str!("../data/sources.json");

static BUILTIN: Lazy<SourceCatalog> = Lazy::new(|| {
    SourceCatalog::from_json_str(BUILTIN_SOURCES_JSON).expect("failed to parse builtin sources")
});

/// An agency's site and the topic pages known on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub name: String,
    pub base_url: String,
    /// Topic name to a path resolved against `base_url`.
    ///
    /// `base_url` is treated as a directory: `"hemp"` lands under it, while
    /// `"/hemp"` starts from the host root.
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
}

impl Agency {
    /// The absolute URL for a topic, if this agency covers it.
    ///
    /// `None` as well when the base URL or the joined result does not parse.
    pub fn url_for(&self, topic: &str) -> Option<String> {
        let path = self.paths.get(topic)?;
        let mut base = Url::parse(&self.base_url).ok()?;
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.join(path).ok().map(String::from)
    }

    fn validate(&self) -> Result<(), String> {
        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            Ok(_) => Err(format!("agency {}: base_url must be http(s)", self.name)),
            Err(err) => Err(format!("agency {}: invalid base_url: {err}", self.name)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// Two-letter code accepted as an alias for the name.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub agencies: Vec<Agency>,
}

/// Static lookup table from jurisdiction and topic to seed URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalog {
    #[serde(default)]
    jurisdictions: BTreeMap<String, Jurisdiction>,
    #[serde(default)]
    federal: Vec<Agency>,
}

impl SourceCatalog {
    /// The catalog shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics on first use if the embedded JSON is malformed.
    pub fn builtin() -> &'static SourceCatalog {
        &BUILTIN
    }

    /// Parses a catalog from JSON. Jurisdiction names and topics are lowercased.
    ///
    /// Every agency needs an absolute http(s) `base_url`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: SourceCatalog = serde_json::from_str(json)?;

        raw.jurisdictions
            .values()
            .flat_map(|j| &j.agencies)
            .chain(&raw.federal)
            .try_for_each(Agency::validate)
            .map_err(serde_json::Error::custom)?;

        let jurisdictions = raw
            .jurisdictions
            .into_iter()
            .map(|(name, mut jurisdiction)| {
                jurisdiction.agencies = jurisdiction.agencies.into_iter().map(lowercase_topics).collect();
                (name.trim().to_lowercase(), jurisdiction)
            })
            .collect();

        Ok(Self {
            jurisdictions,
            federal: raw.federal.into_iter().map(lowercase_topics).collect(),
        })
    }

    /// Seed URLs for a jurisdiction and topic.
    ///
    /// Jurisdiction sources come first, then federal sources for the topic.
    /// Duplicates keep their first position. Unknown jurisdictions or topics
    /// are not an error; they contribute nothing.
    pub fn urls_for(&self, jurisdiction: &str, topic: &str) -> Vec<String> {
        let topic = topic.trim().to_lowercase();

        let local = self
            .find(jurisdiction)
            .map(|j| j.agencies.as_slice())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        local
            .iter()
            .chain(&self.federal)
            .filter_map(|agency| agency.url_for(&topic))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// Looks up a jurisdiction by name or code.
    pub fn find(&self, jurisdiction: &str) -> Option<&Jurisdiction> {
        let key = jurisdiction.trim().to_lowercase();
        self.jurisdictions.get(&key).or_else(|| {
            self.jurisdictions.values().find(|j| {
                j.code
                    .as_deref()
                    .is_some_and(|code| code.eq_ignore_ascii_case(&key))
            })
        })
    }

    /// Names of the jurisdictions with their own sources.
    pub fn jurisdiction_names(&self) -> impl Iterator<Item = &str> {
        self.jurisdictions.keys().map(String::as_str)
    }

    /// Topics covered for a jurisdiction, including federal topics.
    pub fn topics_for(&self, jurisdiction: &str) -> Vec<&str> {
        let local = self
            .find(jurisdiction)
            .map(|j| j.agencies.as_slice())
            .unwrap_or_default();

        let mut topics: Vec<&str> = local
            .iter()
            .chain(&self.federal)
            .flat_map(|agency| agency.paths.keys().map(String::as_str))
            .collect();
        topics.sort_unstable();
        topics.dedup();
        topics
    }
}

fn lowercase_topics(agency: Agency) -> Agency {
    Agency {
        paths: agency
            .paths
            .into_iter()
            .map(|(topic, path)| (topic.trim().to_lowercase(), path))
            .collect(),
        ..agency
    }
}
