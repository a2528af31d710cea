//! Provider-independent rate-limit detection.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Standard remaining-quota header.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
/// Remaining-requests header sent by OpenAI-compatible providers.
pub const RATE_LIMIT_REMAINING_REQUESTS: &str = "x-ratelimit-remaining-requests";
/// Epoch seconds at which the quota resets.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
/// Millisecond-precision variant of `Retry-After` used by OpenAI.
pub const RETRY_AFTER_MS: &str = "retry-after-ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// HTTP 429.
    TooManyRequests,
    /// `X-RateLimit-Remaining: 0`.
    RemainingQuotaExhausted,
    /// `x-ratelimit-remaining-requests: 0`.
    RemainingRequestsExhausted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitVerdict {
    pub limited: bool,
    /// First rule that matched.
    pub reason: Option<RateLimitReason>,
    /// How long the provider asked us to wait, if it said.
    pub retry_after: Option<Duration>,
}

/// Returns the first rate-limit rule matched by a response, if any.
pub fn classify(status: StatusCode, headers: &HeaderMap) -> Option<RateLimitReason> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(RateLimitReason::TooManyRequests);
    }
    if header_is_zero(headers, RATE_LIMIT_REMAINING) {
        return Some(RateLimitReason::RemainingQuotaExhausted);
    }
    if header_is_zero(headers, RATE_LIMIT_REMAINING_REQUESTS) {
        return Some(RateLimitReason::RemainingRequestsExhausted);
    }
    None
}

/// Classifies a response and, when it is rate-limited, extracts the wait hint
/// relative to `now`.
pub fn detect(status: StatusCode, headers: &HeaderMap, now: DateTime<Utc>) -> RateLimitVerdict {
    match classify(status, headers) {
        Some(reason) => RateLimitVerdict {
            limited: true,
            reason: Some(reason),
            retry_after: retry_after_hint(headers, now),
        },
        None => RateLimitVerdict::default(),
    }
}

pub fn is_rate_limited(response: &Response) -> bool {
    classify(response.status(), response.headers()).is_some()
}

/// Wait suggested by the provider, in order of precedence:
/// `retry-after-ms`, `Retry-After` (seconds or HTTP-date), `X-RateLimit-Reset`
/// (epoch seconds). Times in the past yield zero.
pub fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    // Negative, NaN and out-of-range values are not a usable hint
    if let Some(wait) = header_str(headers, RETRY_AFTER_MS)
        .and_then(|v| v.parse::<f64>().ok())
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
    {
        return Some(wait);
    }

    if let Some(value) = header_str(headers, RETRY_AFTER.as_str()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Some(Duration::from_secs(secs));
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(value) {
            return Some(until(date.with_timezone(&Utc), now));
        }
    }

    header_str(headers, RATE_LIMIT_RESET)
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|reset| until(reset, now))
}

fn until(when: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (when - now).to_std().unwrap_or(Duration::ZERO)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn header_is_zero(headers: &HeaderMap, name: &str) -> bool {
    header_str(headers, name) == Some("0")
}
