//! Bounding a single attempt in time.

use log::debug;
use reqwest::Response;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fetcher::Fetcher;
use super::{FetchError, Request, Transport};
use crate::config::FetchConfig;
use crate::runtime::Runtime;

impl<T: Transport, R: Runtime> Fetcher<T, R> {
    /// Races one dispatch against `timeout` and `cancel`.
    ///
    /// Whichever finishes first decides the outcome; the losing branches are
    /// dropped, which aborts an in-flight transport call.
    pub(super) async fn attempt(
        &self,
        request: Request,
        config: &FetchConfig,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(FetchError::Cancelled),

            result = tokio::time::timeout(timeout, self.dispatch(request, config)) => {
                result.unwrap_or_else(|_| {
                    debug!("Request timed out after {} ms", timeout.as_millis());
                    Err(FetchError::Timeout { timeout })
                })
            }
        }
    }
}
