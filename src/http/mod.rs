//! Resilient outbound HTTP: proxy-aware dispatch, per-attempt timeouts,
//! rate-limit detection and retry with backoff.
//!
//! Calls flow `Fetcher::fetch_with_retries` → `fetch_with_timeout` →
//! `fetch_with_proxy` → [`Transport`]. Each layer is usable on its own.

pub mod auth;
mod dispatch;
mod error;
mod fetcher;
pub mod headers;
pub mod proxy;
pub mod rate_limit;
mod request;
mod retry;
mod timeout;
mod transport;

pub use auth::{Credentials, strip_auth_from_url};
pub use dispatch::prepare;
pub use error::{BoxError, FetchError};
pub use fetcher::Fetcher;
pub use headers::{VERSION_HEADER, with_version_header};
pub use proxy::ProxySettings;
pub use rate_limit::{RateLimitReason, RateLimitVerdict, is_rate_limited};
pub use request::Request;
pub use retry::{AttemptOutcome, RetryPolicy, Step, next_step};
pub use transport::{DispatchOptions, PreparedRequest, ReqwestTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;

/// Responses are reqwest's, handed back untouched.
pub use reqwest::Response;
