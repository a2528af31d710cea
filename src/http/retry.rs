//! Retry coordination: backoff policy and the attempt state machine.

use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;
use reqwest::Response;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::auth::strip_auth_from_url;
use super::fetcher::Fetcher;
use super::rate_limit::detect;
use super::{FetchError, Request, Transport};
use crate::config::FetchConfig;
use crate::runtime::Runtime;

/// How many times to try, how long each try may take, and how long to wait
/// in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Deadline for each individual attempt.
    pub timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random amount added to the base delay.
    pub jitter: Duration,
    /// Also retry 5xx responses (they are returned as-is otherwise).
    pub retry_server_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            timeout: config.request_timeout,
            base_delay: config.backoff,
            max_delay: config.max_backoff,
            jitter: config.jitter,
            retry_server_errors: config.retry_server_errors,
        }
    }

    /// Sets the attempt count; zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait after failed attempt number `attempt` (1-based):
    /// `(base_delay + jitter) * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_add(jitter)
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    fn sample_jitter(&self) -> Duration {
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

/// What a single attempt produced, as far as retrying is concerned.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Response),
    RateLimited {
        response: Response,
        retry_after: Option<Duration>,
    },
    /// 5xx while the policy retries server errors.
    ServerError(Response),
    Failed(FetchError),
}

impl AttemptOutcome {
    pub fn classify(
        result: Result<Response, FetchError>,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let response = match result {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::Failed(err),
        };

        let verdict = detect(response.status(), response.headers(), now);
        if verdict.limited {
            AttemptOutcome::RateLimited {
                response,
                retry_after: verdict.retry_after,
            }
        } else if policy.retry_server_errors && response.status().is_server_error() {
            AttemptOutcome::ServerError(response)
        } else {
            AttemptOutcome::Success(response)
        }
    }

    fn describe(&self) -> String {
        match self {
            AttemptOutcome::Success(r) => format!("HTTP {}", r.status()),
            AttemptOutcome::RateLimited { response, .. } => {
                format!("rate limited, HTTP {}", response.status())
            }
            AttemptOutcome::ServerError(r) => format!("HTTP {}", r.status()),
            AttemptOutcome::Failed(err) => err.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Step {
    /// Hand this response to the caller.
    Return(Response),
    /// Wait `delay` and try again. `backoff` is set when the delay came from
    /// the exponential schedule rather than a provider hint.
    Retry { delay: Duration, backoff: bool },
    /// Give up with this error.
    Fail(FetchError),
}

/// Decides what follows attempt number `attempt` (1-based).
///
/// `previous_backoff` is the last delay taken from the exponential schedule;
/// backoff delays never shrink from one attempt to the next.
pub fn next_step(
    policy: &RetryPolicy,
    attempt: u32,
    outcome: AttemptOutcome,
    previous_backoff: Duration,
    jitter: Duration,
) -> Step {
    let last = attempt >= policy.max_attempts;
    let backoff = || Step::Retry {
        delay: policy.backoff(attempt, jitter).max(previous_backoff),
        backoff: true,
    };

    match outcome {
        AttemptOutcome::Success(response) => Step::Return(response),
        AttemptOutcome::RateLimited { response, .. } | AttemptOutcome::ServerError(response)
            if last =>
        {
            Step::Return(response)
        }
        AttemptOutcome::RateLimited { retry_after, .. } => Step::Retry {
            delay: retry_after
                .unwrap_or(policy.base_delay)
                .min(policy.max_delay),
            backoff: false,
        },
        AttemptOutcome::ServerError(_) => backoff(),
        AttemptOutcome::Failed(err) if !err.is_retryable() => Step::Fail(err),
        AttemptOutcome::Failed(err) if last => Step::Fail(FetchError::RetriesExhausted {
            attempts: attempt,
            source: Box::new(err),
        }),
        AttemptOutcome::Failed(_) => backoff(),
    }
}

impl<T: Transport, R: Runtime> Fetcher<T, R> {
    #[tracing::instrument(skip_all, fields(url = %strip_auth_from_url(&request.url), max_attempts = policy.max_attempts))]
    pub(super) async fn run_with_retries(
        &self,
        request: Request,
        config: &FetchConfig,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let mut attempt = 1;
        let mut previous_backoff = Duration::ZERO;

        loop {
            let result = self
                .attempt(request.clone(), config, policy.timeout, cancel)
                .await;
            let outcome = AttemptOutcome::classify(result, policy, self.runtime.now());
            let summary = outcome.describe();

            match next_step(policy, attempt, outcome, previous_backoff, policy.sample_jitter()) {
                Step::Return(response) => return Ok(response),
                Step::Fail(err) => {
                    if matches!(err, FetchError::RetriesExhausted { .. }) {
                        warn!("{}", err);
                    }
                    return Err(err);
                }
                Step::Retry { delay, backoff } => {
                    warn!(
                        "Attempt {}/{} failed ({}), retrying in {}ms...",
                        attempt,
                        policy.max_attempts,
                        summary,
                        delay.as_millis()
                    );
                    if backoff {
                        previous_backoff = delay;
                    }
                    self.pause(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// Waits between attempts without blocking the executor.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = self.runtime.sleep(delay) => Ok(()),
        }
    }
}
