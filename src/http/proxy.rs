//! Proxy selection for a target URL.

use url::Url;

use super::FetchError;
use super::auth::strip_auth_from_url;

/// Proxy configuration as read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy for `http://` targets (`HTTP_PROXY`).
    pub http: Option<String>,
    /// Proxy for `https://` targets (`HTTPS_PROXY`).
    pub https: Option<String>,
    /// Fallback for any scheme (`ALL_PROXY`).
    pub all: Option<String>,
    /// Hosts that must be reached directly (`NO_PROXY`).
    pub no_proxy: Vec<String>,
}

impl ProxySettings {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none() && self.all.is_none()
    }

    /// Proxy URL to use for `target`, or `None` for a direct connection.
    pub fn proxy_for(&self, target: &Url) -> Option<&str> {
        if self.is_empty() || should_bypass_proxy(target, &self.no_proxy) {
            return None;
        }

        let scheme_specific = match target.scheme() {
            "https" => self.https.as_deref(),
            "http" => self.http.as_deref(),
            _ => None,
        };

        scheme_specific.or(self.all.as_deref())
    }
}

/// Validates a proxy URL, assuming `http://` when no scheme is given
/// (`proxy.corp:3128` is a common way to write `HTTP_PROXY`).
pub fn normalize_proxy_url(raw: &str) -> Result<String, FetchError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(candidate),
        _ => Err(FetchError::invalid_configuration(format!(
            "invalid proxy URL '{}'",
            redact(raw)
        ))),
    }
}

// Unparseable URLs can still carry a password before the last '@'.
fn redact(raw: &str) -> String {
    let stripped = strip_auth_from_url(raw);
    match stripped.rsplit_once('@') {
        Some((_, host)) => format!("***@{}", host),
        None => stripped,
    }
}

/// Splits a `NO_PROXY` value into trimmed, lowercased, non-empty entries.
pub fn parse_no_proxy(value: &str) -> Vec<String> {
    value
        .split([',', ' '])
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Checks `target` against a no-proxy list.
///
/// Entries may be `*`, a host, `host:port`, `.suffix` or `*.suffix`. A plain
/// domain also matches its subdomains.
pub fn should_bypass_proxy(target: &Url, no_proxy: &[String]) -> bool {
    let Some(host) = target.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
    let port = target.port_or_known_default();

    no_proxy.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        if entry.is_empty() {
            return false;
        }
        if entry == "*" {
            return true;
        }

        let (pattern, entry_port) = split_port(&entry);
        if let Some(entry_port) = entry_port {
            if Some(entry_port) != port {
                return false;
            }
        }

        let domain = pattern
            .strip_prefix("*.")
            .or_else(|| pattern.strip_prefix('.'))
            .unwrap_or(pattern);

        host == domain || host.ends_with(&format!(".{}", domain))
    })
}

// "[::1]:8080", "example.com:443", "::1" (bare IPv6, no port)
fn split_port(entry: &str) -> (&str, Option<u16>) {
    if let Some(rest) = entry.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, tail)) => (host, tail.strip_prefix(':').and_then(|p| p.parse().ok())),
            None => (entry, None),
        };
    }

    if entry.matches(':').count() == 1 {
        if let Some((host, port)) = entry.split_once(':') {
            if let Ok(port) = port.parse() {
                return (host, Some(port));
            }
        }
    }

    (entry, None)
}
