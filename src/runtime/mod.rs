//! Runtime abstraction for process-level facilities.
//!
//! The fetch layer never reads the environment or touches the clock
//! directly; it goes through this trait so configuration resolution and
//! backoff waits can be driven deterministically in tests.
//!
//! # Structure
//!
//! - `env` - Environment variables
//! - `time` - Wall clock and non-blocking sleep

mod env;
mod time;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::env as std_env;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // Time
    /// Suspends the calling task without blocking the executor.
    async fn sleep(&self, duration: Duration);

    /// Current wall-clock time, used to interpret absolute rate-limit hints.
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleep_impl(duration).await
    }

    fn now(&self) -> DateTime<Utc> {
        self.now_impl()
    }
}
