// ABOUTME: Error types for the harvest engine: ErrorCode, FetchFailure and the ScrapeError struct.
// ABOUTME: Only exhausted fetches, missing sessions and explicit batch cancellation surface to callers.

use std::fmt;

/// Error codes for the failure kinds the engine surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Every fetch attempt for a URL failed.
    FetchExhausted,
    /// A scrape was attempted without an open session, or the session could not be built.
    NotInitialized,
    /// A cancellable batch was cancelled before it finished.
    Cancelled,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::FetchExhausted => "fetch exhausted",
            ErrorCode::NotInitialized => "not initialized",
            ErrorCode::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// The reason a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The server answered with a status other than 200.
    Status(u16),
    /// The attempt did not complete within the configured timeout.
    Timeout,
    /// The request could not be sent (connect, DNS, TLS, redirect loop).
    Request(String),
    /// The response body could not be read.
    Body(String),
    /// The body exceeded the size cap.
    TooLarge(u64),
    /// The URL could not be parsed.
    InvalidUrl(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(status) => write!(f, "HTTP {}", status),
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::Request(msg) => write!(f, "request failed: {}", msg),
            FetchFailure::Body(msg) => write!(f, "failed to read body: {}", msg),
            FetchFailure::TooLarge(len) => write!(f, "content too large ({} bytes)", len),
            FetchFailure::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
        }
    }
}

/// The error type for scrape operations.
#[derive(Debug, thiserror::Error)]
pub struct ScrapeError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    /// Number of fetch attempts made before giving up (0 when no request was sent).
    pub attempts: u32,
    pub last_failure: Option<FetchFailure>,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "harvest: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref last) = self.last_failure {
            write!(f, ": {}", last)?;
        }
        if self.attempts > 0 {
            write!(f, " (after {} attempt(s))", self.attempts)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ScrapeError {
    /// Create a FetchExhausted error carrying the last observed failure.
    pub fn fetch_exhausted(
        url: impl Into<String>,
        op: impl Into<String>,
        attempts: u32,
        last_failure: FetchFailure,
    ) -> Self {
        Self {
            code: ErrorCode::FetchExhausted,
            url: url.into(),
            op: op.into(),
            attempts,
            last_failure: Some(last_failure),
            source: None,
        }
    }

    /// Create a NotInitialized error.
    pub fn not_initialized(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::NotInitialized,
            url: url.into(),
            op: op.into(),
            attempts: 0,
            last_failure: None,
            source,
        }
    }

    /// Create a Cancelled error.
    pub fn cancelled(op: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Cancelled,
            url: String::new(),
            op: op.into(),
            attempts: 0,
            last_failure: None,
            source: None,
        }
    }

    /// Returns true if this is a FetchExhausted error.
    pub fn is_fetch_exhausted(&self) -> bool {
        self.code == ErrorCode::FetchExhausted
    }

    /// Returns true if this is a NotInitialized error.
    pub fn is_not_initialized(&self) -> bool {
        self.code == ErrorCode::NotInitialized
    }

    /// Returns true if this is a Cancelled error.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Returns true if the last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self.last_failure, Some(FetchFailure::Timeout))
    }

    /// The HTTP status of the last attempt, if it got that far.
    pub fn last_status(&self) -> Option<u16> {
        match self.last_failure {
            Some(FetchFailure::Status(status)) => Some(status),
            _ => None,
        }
    }
}
