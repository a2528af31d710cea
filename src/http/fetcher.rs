//! Entry points of the fetch stack.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::auth::strip_auth_from_url;
use super::{FetchError, ReqwestTransport, Request, Response, RetryPolicy, Transport};
use crate::config::FetchConfig;
use crate::runtime::{RealRuntime, Runtime};

/// Binds a [`Transport`] to a [`Runtime`].
///
/// Holds no mutable state: configuration is re-read from the runtime at the
/// start of every top-level call, so concurrent calls never influence each
/// other.
pub struct Fetcher<T = ReqwestTransport, R = RealRuntime> {
    pub(super) transport: T,
    pub(super) runtime: R,
}

impl Fetcher {
    /// Real network, real environment, real clock.
    pub fn from_env() -> Self {
        Self::new(ReqwestTransport, RealRuntime)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::from_env()
    }
}

impl<T: Transport, R: Runtime> Fetcher<T, R> {
    pub fn new(transport: T, runtime: R) -> Self {
        Self { transport, runtime }
    }

    /// Current configuration as seen through the runtime.
    pub fn config(&self) -> FetchConfig {
        FetchConfig::from_runtime(&self.runtime)
    }

    /// Default retry policy derived from [`Fetcher::config`].
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config())
    }

    /// Issues exactly one request through the configured proxy.
    #[tracing::instrument(skip_all, fields(url = %strip_auth_from_url(&request.url)))]
    pub async fn fetch_with_proxy(&self, request: Request) -> Result<Response, FetchError> {
        let config = self.config();
        self.dispatch(request, &config).await
    }

    /// Issues one request, failing with [`FetchError::Timeout`] if it takes
    /// longer than `timeout`.
    pub async fn fetch_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, FetchError> {
        self.fetch_with_timeout_cancellable(request, timeout, &CancellationToken::new())
            .await
    }

    #[tracing::instrument(skip_all, fields(url = %strip_auth_from_url(&request.url), timeout_ms = timeout.as_millis() as u64))]
    pub async fn fetch_with_timeout_cancellable(
        &self,
        request: Request,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let config = self.config();
        self.attempt(request, &config, timeout, cancel).await
    }

    /// Retries transport failures, timeouts and rate-limited responses.
    ///
    /// `timeout` and `max_retries` override the configured per-attempt
    /// timeout and attempt count. A response that is still rate-limited after
    /// the last attempt is returned, not turned into an error.
    pub async fn fetch_with_retries(
        &self,
        request: Request,
        timeout: Option<Duration>,
        max_retries: Option<u32>,
    ) -> Result<Response, FetchError> {
        let config = self.config();
        let mut policy = RetryPolicy::from_config(&config);
        if let Some(timeout) = timeout {
            policy = policy.with_timeout(timeout);
        }
        if let Some(max_retries) = max_retries {
            policy = policy.with_max_attempts(max_retries);
        }

        self.run_with_retries(request, &config, &policy, &CancellationToken::new())
            .await
    }

    /// Like [`Fetcher::fetch_with_retries`] with an explicit policy. Cancelling
    /// `cancel` abandons the in-flight attempt or pending wait and fails with
    /// [`FetchError::Cancelled`].
    pub async fn fetch_with_retries_cancellable(
        &self,
        request: Request,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let config = self.config();
        self.run_with_retries(request, &config, policy, cancel).await
    }

    /// Retrying fetch with every setting taken from the configuration.
    pub async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        self.fetch_with_retries(request, None, None).await
    }
}
