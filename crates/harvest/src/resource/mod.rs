// ABOUTME: Fetch policy for page retrieval: per-attempt timeout, linear backoff retries and rate limiting.
// ABOUTME: Also handles content-length limits and charset decoding of response bodies.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{FetchFailure, ScrapeError};

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Default delay between requests, and the backoff unit.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(1000);

/// Default number of attempts per URL.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent, identifying the bot by name and version.
pub const DEFAULT_USER_AGENT: &str = "TGF-MRP Compliance Bot/1.0";

/// Retry, backoff and rate-limit settings for fetching pages.
///
/// A failed attempt (non-200 status, timeout, transport or body error) is
/// followed by a wait of `rate_limit_delay × (attempt + 1)` before the next
/// one. After a successful attempt the policy waits `rate_limit_delay` once
/// more before handing the body back, which spaces out the next request
/// issued by the same scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    pub rate_limit_delay: Duration,
    /// Total attempts per URL; values below 1 are treated as 1.
    pub max_retries: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchPolicy {
    /// Number of attempts actually made, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay after the failed attempt with the given zero-based index.
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        self.rate_limit_delay
            .saturating_mul(attempt_index.saturating_add(1))
    }

    /// Fetches `url` with retries, returning the first 200 response.
    ///
    /// Fails with `FetchExhausted` carrying the last failure once every
    /// attempt is spent. A URL that does not parse fails right away.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<FetchResult, ScrapeError> {
        if let Err(e) = url::Url::parse(url) {
            return Err(ScrapeError::fetch_exhausted(
                url,
                "Fetch",
                1,
                FetchFailure::InvalidUrl(e.to_string()),
            ));
        }

        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            debug!(url = %url, attempt = attempt + 1, of = attempts, "fetch attempt");
            let failure = match self.attempt(client, url, headers).await {
                Ok(result) => {
                    // throttles the next request from this scraper, not this one
                    tokio::time::sleep(self.rate_limit_delay).await;
                    return Ok(result);
                }
                Err(failure) => failure,
            };

            if attempt + 1 >= attempts {
                warn!(url = %url, attempts, error = %failure, "giving up on URL");
                return Err(ScrapeError::fetch_exhausted(url, "Fetch", attempts, failure));
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                url = %url,
                attempt = attempt + 1,
                error = %failure,
                retry_in_ms = delay.as_millis() as u64,
                "fetch attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One GET request under the per-attempt timeout.
    async fn attempt(
        &self,
        client: &reqwest::Client,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<FetchResult, FetchFailure> {
        let mut request = client.get(url).timeout(self.timeout);
        // per request, so an injected client still identifies as the bot
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
            request = request.header(reqwest::header::USER_AGENT, self.user_agent.as_str());
        }
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(request_failure)?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchFailure::Status(status));
        }

        let content_length = response.content_length().or_else(|| {
            response
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        });
        if let Some(len) = content_length {
            if len as usize > MAX_CONTENT_LENGTH {
                return Err(FetchFailure::TooLarge(len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Body(e.to_string())
            }
        })?;

        if body.len() > MAX_CONTENT_LENGTH {
            return Err(FetchFailure::TooLarge(body.len() as u64));
        }

        Ok(FetchResult {
            status,
            url: url.to_string(),
            final_url,
            content_type,
            body,
        })
    }
}

fn request_failure(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Request(e.to_string())
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, using the content-type charset when present.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}
