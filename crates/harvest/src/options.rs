// ABOUTME: Configuration options for the harvest engine: Options and ScraperBuilder.
// ABOUTME: ScraperBuilder provides a fluent API for constructing Scraper instances with custom settings.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::Scraper;
use crate::extractors::select::SelectorConfig;
use crate::resource::FetchPolicy;

/// Default ceiling on concurrently running scrape tasks in a batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Configuration options for a Scraper.
#[derive(Debug, Clone)]
pub struct Options {
    pub policy: FetchPolicy,
    /// Field selectors used when a call supplies none.
    pub selectors: SelectorConfig,
    /// Upper bound on in-flight requests per batch; values below 1 are treated as 1.
    pub max_concurrency: usize,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    /// Preconfigured client used as the session instead of building one.
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            policy: FetchPolicy::default(),
            selectors: SelectorConfig::builtin(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            headers: HashMap::new(),
            http_client: None,
        }
    }
}

/// Builder for constructing Scraper instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ScraperBuilder {
    opts: Options,
}

impl ScraperBuilder {
    /// Create a new ScraperBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the delay between requests (also the backoff unit).
    pub fn rate_limit_delay(mut self, delay: Duration) -> Self {
        self.opts.policy.rate_limit_delay = delay;
        self
    }

    /// Set the number of attempts per URL.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.opts.policy.max_retries = max_retries;
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.policy.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.policy.user_agent = user_agent.into();
        self
    }

    /// Replace the whole fetch policy.
    pub fn policy(mut self, policy: FetchPolicy) -> Self {
        self.opts.policy = policy;
        self
    }

    /// Set the default field selectors.
    pub fn selectors(mut self, selectors: SelectorConfig) -> Self {
        self.opts.selectors = selectors;
        self
    }

    /// Set the batch concurrency ceiling.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.opts.max_concurrency = max_concurrency;
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom HTTP client as the session.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Build the Scraper with the configured options.
    pub fn build(self) -> Scraper {
        Scraper::new(self.opts)
    }
}

impl Default for ScraperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
