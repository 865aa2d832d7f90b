// ABOUTME: Main library entry point for the regwatch harvest engine.
// ABOUTME: Re-exports the public API: Scraper, ScraperBuilder, ScrapedRecord, SelectorConfig, SourceCatalog, ScrapeError.

//! Harvest - compliance page extraction for regulatory web sites.
//!
//! This crate fetches government regulation pages under a polite retry and
//! rate-limit policy, and turns each page into a [`ScrapedRecord`] holding its
//! title, cleaned content, metadata, links and caller-configured fields.
//!
//! # Example
//!
//! ```no_run
//! use regwatch_harvest::{scrape_jurisdiction, ScrapeError, Scraper, SourceCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ScrapeError> {
//!     let mut scraper = Scraper::builder().build();
//!     let records =
//!         scrape_jurisdiction(&mut scraper, SourceCatalog::builtin(), "colorado", "organic").await?;
//!     for record in &records {
//!         println!("{}: {}", record.url, record.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod catalog;
pub mod client;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod normalize;
pub mod options;
pub mod record;
pub mod resource;

pub use crate::batch::{scrape_jurisdiction, BatchReport};
pub use crate::catalog::SourceCatalog;
pub use crate::client::{Scraper, SessionGuard};
pub use crate::error::{ErrorCode, FetchFailure, ScrapeError};
pub use crate::extractors::select::{FieldSelector, SelectorConfig};
pub use crate::options::{Options, ScraperBuilder};
pub use crate::record::{
    find_links_matching, find_regulation_links, RecordSummary, ScrapedRecord, SummaryLimits,
    DEFAULT_REQUIREMENT_MODALS, DEFAULT_REQUIREMENT_SUBJECT, DEFAULT_SECTION_KEYWORDS,
};
pub use crate::resource::FetchPolicy;
