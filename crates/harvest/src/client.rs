// ABOUTME: The Scraper that fetches a page under the fetch policy and turns it into a ScrapedRecord.
// ABOUTME: Owns the HTTP session, which is opened through a SessionGuard and released when the guard drops.

use std::borrow::Cow;
use std::ops::Deref;

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::error::ScrapeError;
use crate::extractors::compiled::CompiledSelectors;
use crate::extractors::select::SelectorConfig;
use crate::normalize::normalize;
use crate::options::{Options, ScraperBuilder};
use crate::record::ScrapedRecord;

/// Fetches pages and extracts structured records from them.
///
/// Requests go through a session that must be opened first:
///
/// ```no_run
/// # async fn run() -> Result<(), regwatch_harvest::ScrapeError> {
/// use regwatch_harvest::Scraper;
///
/// let mut scraper = Scraper::builder().build();
/// let session = scraper.open()?;
/// let record = session.scrape("https://www.cdfa.ca.gov/is/ffldrs/").await?;
/// println!("{}", record.title);
/// # Ok(())
/// # }
/// ```
pub struct Scraper {
    opts: Options,
    selectors: CompiledSelectors,
    session: Option<reqwest::Client>,
}

impl Scraper {
    /// Create a new ScraperBuilder for configuring the scraper.
    pub fn builder() -> ScraperBuilder {
        ScraperBuilder::new()
    }

    /// Create a new Scraper with the given options. No session is opened.
    pub fn new(opts: Options) -> Self {
        let selectors = CompiledSelectors::compile(&opts.selectors);
        Self {
            opts,
            selectors,
            session: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Returns true while a session is open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Opens the HTTP session and returns a guard that closes it on drop.
    ///
    /// The guard derefs to the scraper, so scrapes run through it. The session
    /// is released on every exit path that drops the guard, including `?`
    /// returns and cancellation of the enclosing future.
    pub fn open(&mut self) -> Result<SessionGuard<'_>, ScrapeError> {
        if self.session.is_none() {
            self.session = Some(self.build_session()?);
            debug!("scraper session opened");
        }
        Ok(SessionGuard { scraper: self })
    }

    /// Releases the session, if one is open.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("scraper session closed");
        }
    }

    fn build_session(&self) -> Result<reqwest::Client, ScrapeError> {
        if let Some(client) = &self.opts.http_client {
            return Ok(client.clone());
        }

        reqwest::Client::builder()
            .user_agent(&self.opts.policy.user_agent)
            .timeout(self.opts.policy.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ScrapeError::not_initialized("", "Open", Some(e.into())))
    }

    /// Scrapes a URL with the default selectors, collecting links.
    pub async fn scrape(&self, url: &str) -> Result<ScrapedRecord, ScrapeError> {
        self.scrape_with(url, None, true).await
    }

    /// Scrapes a URL.
    ///
    /// `selectors` replaces the scraper's default configuration when it is
    /// given and non-empty. Fails with `NotInitialized` when no session is
    /// open and with `FetchExhausted` when every attempt failed.
    pub async fn scrape_with(
        &self,
        url: &str,
        selectors: Option<&SelectorConfig>,
        extract_links: bool,
    ) -> Result<ScrapedRecord, ScrapeError> {
        let compiled = self.compiled_for(selectors);
        self.scrape_compiled(url, &compiled, extract_links).await
    }

    pub(crate) async fn scrape_compiled(
        &self,
        url: &str,
        selectors: &CompiledSelectors,
        extract_links: bool,
    ) -> Result<ScrapedRecord, ScrapeError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ScrapeError::not_initialized(url, "Scrape", None))?;

        let fetched = self
            .opts
            .policy
            .fetch(session, url, &self.opts.headers)
            .await?;

        Ok(self.build_record(&fetched.text(), url, selectors, extract_links))
    }

    /// Builds a record from markup already in hand. No session is needed.
    ///
    /// Relative links are resolved against `url`; if it does not parse, no
    /// links are collected.
    pub fn parse_html(
        &self,
        html: &str,
        url: &str,
        selectors: Option<&SelectorConfig>,
        extract_links: bool,
    ) -> ScrapedRecord {
        let compiled = self.compiled_for(selectors);
        self.build_record(html, url, &compiled, extract_links)
    }

    fn build_record(
        &self,
        html: &str,
        url: &str,
        selectors: &CompiledSelectors,
        extract_links: bool,
    ) -> ScrapedRecord {
        let doc = Html::parse_document(html);
        let extracted_fields = selectors.extract(&doc);
        let page_url = Url::parse(url).ok();
        let page = normalize(&doc, &extracted_fields, page_url.as_ref(), extract_links);

        ScrapedRecord {
            url: url.to_string(),
            title: page.title,
            content: page.content,
            metadata: page.metadata,
            links: page.links,
            extracted_fields,
            full_text: page.full_text,
        }
    }

    /// The selectors for a call: `custom` compiled afresh when given and
    /// non-empty, otherwise the scraper's own.
    pub(crate) fn compiled_for(&self, custom: Option<&SelectorConfig>) -> Cow<'_, CompiledSelectors> {
        match custom.filter(|config| !config.is_empty()) {
            Some(config) => Cow::Owned(CompiledSelectors::compile(config)),
            None => Cow::Borrowed(&self.selectors),
        }
    }
}

/// An open scraper session. Dropping the guard closes the session.
pub struct SessionGuard<'a> {
    scraper: &'a mut Scraper,
}

impl Deref for SessionGuard<'_> {
    type Target = Scraper;

    fn deref(&self) -> &Scraper {
        self.scraper
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.scraper.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::normalize::STRUCTURED_DATA_KEY;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    const REGULATION_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>CDFA - Fertilizer</title>
    <meta name="description" content="Fertilizing materials licensing">
    <script type="application/ld+json">{"@type": "GovernmentService"}</script>
</head>
<body>
    <a href="#main">Skip to main content</a>
    <h1>Fertilizing Materials</h1>
    <main>
        <p>All   labels must be registered.</p>
        <span class="code">FAC 14601</span>
        <a href="/rules/labeling">Labeling rules</a>
        <a href="/rules/labeling">Labeling rules (again)</a>
        <a href="mailto:ffldrs@example.gov">Email</a>
    </main>
</body>
</html>"##;

    fn test_scraper() -> Scraper {
        Scraper::builder()
            .rate_limit_delay(Duration::ZERO)
            .max_retries(1)
            .timeout(Duration::from_secs(5))
            .build()
    }

    #[tokio::test]
    async fn scrape_without_session_is_not_initialized() {
        let scraper = test_scraper();

        let err = scraper
            .scrape("https://www.cdfa.ca.gov/is/ffldrs/")
            .await
            .expect_err("no session is open");

        assert_eq!(err.code, ErrorCode::NotInitialized);
        assert_eq!(err.url, "https://www.cdfa.ca.gov/is/ffldrs/");
    }

    #[tokio::test]
    async fn scrape_builds_record() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/is/ffldrs/");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(REGULATION_PAGE);
        });

        let mut scraper = test_scraper();
        let session = scraper.open().expect("session opens");
        let url = server.url("/is/ffldrs/");
        let record = session.scrape(&url).await.expect("scrape should succeed");
        mock.assert();

        assert_eq!(record.url, url);
        assert_eq!(record.title, "Fertilizing Materials");
        assert_eq!(
            record.content,
            "All labels must be registered. FAC 14601 Labeling rules Labeling rules (again) Email"
        );
        assert_eq!(
            record.metadata.get("description"),
            Some(&json!("Fertilizing materials licensing"))
        );
        assert_eq!(
            record.metadata.get(STRUCTURED_DATA_KEY),
            Some(&json!({"@type": "GovernmentService"}))
        );

        // the in-page skip link resolves to an http URL too; mailto is dropped
        let base = Url::parse(&url).unwrap();
        let expected: std::collections::BTreeSet<String> = ["#main", "/rules/labeling"]
            .iter()
            .map(|href| base.join(href).unwrap().to_string())
            .collect();
        assert_eq!(record.links, expected);

        assert_eq!(record.field("regulation_code"), Some("FAC 14601"));
        assert_eq!(record.field("author"), Some(""));
        assert_eq!(record.extracted_fields.len(), 5);
    }

    #[tokio::test]
    async fn scrape_sends_configured_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", "StateBot/2.0");
            then.status(200).body("<p>ok</p>");
        });

        let mut scraper = Scraper::builder()
            .rate_limit_delay(Duration::ZERO)
            .user_agent("StateBot/2.0")
            .build();
        let session = scraper.open().unwrap();
        session.scrape(&server.url("/ua")).await.expect("scrape");
        mock.assert();
    }

    #[tokio::test]
    async fn injected_client_still_sends_configured_user_agent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", "StateBot/2.0");
            then.status(200).body("<p>ok</p>");
        });

        let mut scraper = Scraper::builder()
            .rate_limit_delay(Duration::ZERO)
            .user_agent("StateBot/2.0")
            .http_client(reqwest::Client::new())
            .build();
        let session = scraper.open().unwrap();
        session
            .scrape(&server.url("/ua"))
            .await
            .expect("injected client request carries the agent");
        mock.assert();
    }

    #[tokio::test]
    async fn scrape_failure_is_tagged_with_url() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let mut scraper = test_scraper();
        let session = scraper.open().unwrap();
        let url = server.url("/gone");
        let err = session.scrape(&url).await.expect_err("404 exhausts");

        assert!(err.is_fetch_exhausted());
        assert_eq!(err.url, url);
        assert_eq!(err.last_status(), Some(404));
    }

    #[tokio::test]
    async fn session_closes_when_guard_drops() {
        let mut scraper = test_scraper();
        {
            let session = scraper.open().unwrap();
            assert!(session.is_open());
        }
        assert!(!scraper.is_open());

        let err = scraper.scrape("https://gov.example/").await.unwrap_err();
        assert!(err.is_not_initialized());
    }

    #[test]
    fn custom_selectors_replace_defaults() {
        let scraper = test_scraper();
        let custom = SelectorConfig::new()
            .with_field("heading", "h1")
            .with_field("fee", "td.fee");

        let record = scraper.parse_html(REGULATION_PAGE, "https://gov.example/", Some(&custom), true);

        let keys: Vec<&str> = record.extracted_fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["fee", "heading"]);
        assert_eq!(record.field("fee"), Some(""));
        // no title field configured: falls back to <title>
        assert_eq!(record.title, "CDFA - Fertilizer");
    }

    #[test]
    fn custom_selectors_leave_scraper_defaults_alone() {
        let scraper = test_scraper();
        for i in 0..20 {
            let custom = SelectorConfig::new().with_field(format!("field_{i}"), format!("td.col-{i}").as_str());
            let record = scraper.parse_html(REGULATION_PAGE, "https://gov.example/", Some(&custom), false);
            assert_eq!(record.extracted_fields.len(), 1);
        }

        assert_eq!(scraper.compiled_for(None).len(), 5);
        let record = scraper.parse_html(REGULATION_PAGE, "https://gov.example/", None, false);
        assert_eq!(record.field("regulation_code"), Some("FAC 14601"));
    }

    #[test]
    fn empty_custom_selectors_fall_back_to_defaults() {
        let scraper = test_scraper();
        let record = scraper.parse_html(
            REGULATION_PAGE,
            "https://gov.example/",
            Some(&SelectorConfig::new()),
            true,
        );
        assert_eq!(record.extracted_fields.len(), 5);
    }

    #[test]
    fn parse_html_without_links() {
        let scraper = test_scraper();
        let record = scraper.parse_html(REGULATION_PAGE, "https://gov.example/", None, false);
        assert!(record.links.is_empty());
        assert!(!record.content.contains("Skip to main content"));
    }
}
