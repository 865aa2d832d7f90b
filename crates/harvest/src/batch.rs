// ABOUTME: Batch orchestration: scrapes many URLs concurrently under one open session.
// ABOUTME: Per-URL failures are collected rather than aborting the batch; a token can cancel the whole batch.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::SourceCatalog;
use crate::client::Scraper;
use crate::error::ScrapeError;
use crate::extractors::select::SelectorConfig;
use crate::record::ScrapedRecord;

/// Outcome of a batch: the records that were produced and the URLs that failed.
///
/// Neither list follows input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<ScrapedRecord>,
    pub failures: Vec<ScrapeError>,
}

impl BatchReport {
    /// Number of URLs the batch was asked to scrape.
    pub fn requested(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    /// True when every URL produced a record.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn push(&mut self, outcome: Result<ScrapedRecord, ScrapeError>) {
        match outcome {
            Ok(record) => self.records.push(record),
            Err(err) => {
                warn!(url = %err.url, error = %err, "scrape failed; excluded from batch");
                self.failures.push(err);
            }
        }
    }
}

impl Scraper {
    /// Scrapes every URL concurrently and returns the records that succeeded.
    ///
    /// At most `max_concurrency` requests are in flight at once. A URL that
    /// fails is dropped from the result. Fails only when no session is open.
    pub async fn scrape_many<S: AsRef<str>>(
        &self,
        urls: &[S],
        selectors: Option<&SelectorConfig>,
    ) -> Result<Vec<ScrapedRecord>, ScrapeError> {
        Ok(self.scrape_many_report(urls, selectors, true).await?.records)
    }

    /// Like [`Scraper::scrape_many`], but also returns the per-URL failures.
    ///
    /// With `extract_links` off no page links are collected.
    pub async fn scrape_many_report<S: AsRef<str>>(
        &self,
        urls: &[S],
        selectors: Option<&SelectorConfig>,
        extract_links: bool,
    ) -> Result<BatchReport, ScrapeError> {
        if !self.is_open() {
            return Err(ScrapeError::not_initialized("", "ScrapeMany", None));
        }

        let compiled = self.compiled_for(selectors);
        let limit = self.options().max_concurrency.max(1);
        let mut outcomes = stream::iter(urls.iter().map(AsRef::as_ref))
            .map(|url| self.scrape_compiled(url, &compiled, extract_links))
            .buffer_unordered(limit);

        let mut report = BatchReport::default();
        while let Some(outcome) = outcomes.next().await {
            report.push(outcome);
        }

        info!(
            requested = urls.len(),
            succeeded = report.records.len(),
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }

    /// Runs [`Scraper::scrape_many`] until it finishes or `token` is cancelled.
    ///
    /// Cancellation drops every in-flight request and discards records already
    /// completed; the call then fails with `Cancelled`.
    pub async fn scrape_many_until<S: AsRef<str>>(
        &self,
        urls: &[S],
        selectors: Option<&SelectorConfig>,
        token: &CancellationToken,
    ) -> Result<Vec<ScrapedRecord>, ScrapeError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!(requested = urls.len(), "batch cancelled");
                Err(ScrapeError::cancelled("ScrapeMany"))
            }
            result = self.scrape_many(urls, selectors) => result,
        }
    }
}

/// Scrapes every catalog URL known for a jurisdiction and topic.
///
/// Opens a session for the duration of the batch and releases it afterwards.
/// An unknown jurisdiction or topic is not an error: it is logged and yields
/// no records.
pub async fn scrape_jurisdiction(
    scraper: &mut Scraper,
    catalog: &SourceCatalog,
    jurisdiction: &str,
    topic: &str,
) -> Result<Vec<ScrapedRecord>, ScrapeError> {
    let urls = catalog.urls_for(jurisdiction, topic);
    if urls.is_empty() {
        warn!(jurisdiction, topic, "no known URLs");
        return Ok(Vec::new());
    }

    info!(jurisdiction, topic, count = urls.len(), "scraping catalog sources");
    let session = scraper.open()?;
    let records = session.scrape_many(&urls, None).await?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchFailure;

    fn record(url: &str) -> ScrapedRecord {
        ScrapedRecord {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = BatchReport::default();
        report.push(Ok(record("https://a.example/")));
        report.push(Err(ScrapeError::fetch_exhausted(
            "https://b.example/",
            "Fetch",
            3,
            FetchFailure::Timeout,
        )));

        assert_eq!(report.requested(), 2);
        assert_eq!(report.records.len(), 1);
        assert!(!report.is_complete());
        assert!(report.failures[0].is_timeout());
    }

    #[tokio::test]
    async fn batch_requires_open_session() {
        let scraper = Scraper::builder().build();
        let err = scraper
            .scrape_many(&["https://a.example/"], None)
            .await
            .unwrap_err();
        assert!(err.is_not_initialized());
    }

    #[tokio::test]
    async fn unknown_jurisdiction_yields_nothing() {
        let mut scraper = Scraper::builder().build();
        let catalog = SourceCatalog::builtin();

        let records = scrape_jurisdiction(&mut scraper, catalog, "florida", "hemp")
            .await
            .expect("unknown sources are not an error");
        assert!(records.is_empty());
        assert!(!scraper.is_open());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let mut scraper = Scraper::builder().build();
        let session = scraper.open().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = session
            .scrape_many_until(&["https://a.example/"], None, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
