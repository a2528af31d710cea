//! Process-wide fetch configuration, resolved from the environment.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::proxy::{ProxySettings, parse_no_proxy};
use crate::runtime::Runtime;

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Default number of attempts made by the retry coordinator.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default base delay between attempts in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 5_000;

/// Upper bound for a single backoff wait in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 120_000;

/// Upper bound for the random jitter added to each backoff, in milliseconds.
pub const DEFAULT_JITTER_MS: u64 = 1_000;

pub const ENV_INSECURE_SSL: &str = "PROMPTFOO_INSECURE_SSL";
pub const ENV_CA_CERT_PATH: &str = "PROMPTFOO_CA_CERT_PATH";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "PROMPTFOO_REQUEST_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "PROMPTFOO_MAX_RETRIES";
pub const ENV_BACKOFF_MS: &str = "PROMPTFOO_REQUEST_BACKOFF_MS";
pub const ENV_RETRY_5XX: &str = "PROMPTFOO_RETRY_5XX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub proxy: ProxySettings,
    /// Verify TLS certificates. Disabled by `PROMPTFOO_INSECURE_SSL`.
    pub reject_unauthorized: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
    pub retry_server_errors: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            proxy: ProxySettings::default(),
            reject_unauthorized: true,
            ca_cert_path: None,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            jitter: Duration::from_millis(DEFAULT_JITTER_MS),
            retry_server_errors: false,
        }
    }
}

impl FetchConfig {
    /// Reads the configuration through `runtime`. Never fails: unparseable
    /// numbers fall back to their defaults with a warning.
    #[tracing::instrument(skip(runtime))]
    pub fn from_runtime<R: Runtime + ?Sized>(runtime: &R) -> Self {
        let proxy = ProxySettings {
            http: env_string(runtime, &["HTTP_PROXY", "http_proxy"]),
            https: env_string(runtime, &["HTTPS_PROXY", "https_proxy"]),
            all: env_string(runtime, &["ALL_PROXY", "all_proxy"]),
            no_proxy: env_string(runtime, &["NO_PROXY", "no_proxy"])
                .map(|v| parse_no_proxy(&v))
                .unwrap_or_default(),
        };

        Self {
            proxy,
            reject_unauthorized: !env_bool(runtime, ENV_INSECURE_SSL),
            ca_cert_path: env_string(runtime, &[ENV_CA_CERT_PATH]).map(PathBuf::from),
            request_timeout: Duration::from_millis(env_u64(
                runtime,
                ENV_REQUEST_TIMEOUT_MS,
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            max_retries: (env_u64(runtime, ENV_MAX_RETRIES, u64::from(DEFAULT_MAX_RETRIES))
                .min(u64::from(u32::MAX)) as u32)
                .max(1),
            backoff: Duration::from_millis(env_u64(runtime, ENV_BACKOFF_MS, DEFAULT_BACKOFF_MS)),
            retry_server_errors: env_bool(runtime, ENV_RETRY_5XX),
            ..Self::default()
        }
    }
}

/// First non-empty value among `keys`.
fn env_string<R: Runtime + ?Sized>(runtime: &R, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| runtime.env_var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn env_bool<R: Runtime + ?Sized>(runtime: &R, key: &str) -> bool {
    env_string(runtime, &[key])
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_u64<R: Runtime + ?Sized>(runtime: &R, key: &str, default: u64) -> u64 {
    match env_string(runtime, &[key]) {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring {}={:?}: not a non-negative integer, using {}", key, value, default);
            default
        }),
        None => default,
    }
}
