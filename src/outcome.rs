//! Typed outcome of a single call to a remote collaborator.
//!
//! Both the channel transport and the text provider report every round-trip
//! as a [`CallOutcome`], so callers branch on rate limits and failures
//! explicitly instead of string-matching error messages.

use std::time::Duration;

/// Why a remote call failed, when it was not a rate limit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallFailure {
    /// Connection refused, reset, DNS failure, timeout.
    #[error("network error: {0}")]
    Network(String),
    /// The remote answered with a non-success status other than 429.
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    /// The remote answered 2xx but the body was unusable.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CallFailure {
    /// Build a failure from a `reqwest` transport error.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result of one attempt at a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    /// The remote asked us to slow down. `retry_after` is its hint, if any.
    RateLimited { retry_after: Option<Duration> },
    Failed(CallFailure),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Map the success payload, keeping rate-limit and failure variants.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            Self::Success(value) => CallOutcome::Success(f(value)),
            Self::RateLimited { retry_after } => CallOutcome::RateLimited { retry_after },
            Self::Failed(failure) => CallOutcome::Failed(failure),
        }
    }
}

/// Convert a fractional seconds hint into a `Duration`.
///
/// Negative, NaN and out-of-range hints yield `None`.
pub fn retry_after_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Parse a `Retry-After` header value given in (possibly fractional) seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(retry_after_from_secs)
}

/// Read the `Retry-After` header off a response, if present and numeric.
pub fn retry_after_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_header)
}
