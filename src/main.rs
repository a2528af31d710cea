use anyhow::{Context, Result, bail};
use clap::Parser;
use promptfoo_fetch::http::{Fetcher, Request, Response};
use reqwest::Method;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// promptfoo-fetch - resilient HTTP client
///
/// Sends one HTTP request with proxy support, a per-attempt timeout and
/// retries on network errors and rate limiting, then prints the response
/// body.
///
/// Proxies are taken from HTTPS_PROXY, HTTP_PROXY and ALL_PROXY, with
/// NO_PROXY listing hosts to reach directly. Set PROMPTFOO_INSECURE_SSL to
/// skip certificate verification or PROMPTFOO_CA_CERT_PATH to trust an extra
/// CA.
///
/// Examples:
///   promptfoo-fetch https://api.example.com/health
///   promptfoo-fetch -X POST -H 'Content-Type: application/json' -d '{}' https://api.example.com/v1
#[derive(Parser, Debug)]
#[command(author, version = promptfoo_fetch::VERSION, about)]
struct Cli {
    /// URL to request; credentials in it are sent as Basic auth
    #[arg(value_name = "URL")]
    url: String,

    /// HTTP method
    #[arg(short = 'X', long = "request", value_name = "METHOD", default_value = "GET")]
    method: String,

    /// Extra header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long = "data", value_name = "DATA")]
    data: Option<String>,

    /// Per-attempt timeout in milliseconds (also via PROMPTFOO_REQUEST_TIMEOUT_MS)
    #[arg(long = "timeout-ms", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Maximum number of attempts (also via PROMPTFOO_MAX_RETRIES)
    #[arg(long = "retries", value_name = "N", conflicts_with = "no_retry")]
    retries: Option<u32>,

    /// Send a single attempt
    #[arg(long = "no-retry")]
    no_retry: bool,

    /// Print the status line and response headers before the body
    #[arg(short = 'i', long = "include")]
    include: bool,

    /// Exit with an error on HTTP status 400 and above
    #[arg(short = 'f', long = "fail")]
    fail: bool,
}

impl Cli {
    fn request(&self) -> Result<Request> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method '{}'", self.method))?;

        let mut request = Request::new(method, &self.url);
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header '{}', expected 'Name: value'", header))?;
            request = request.try_header(name, value)?;
        }
        if let Some(data) = &self.data {
            request = request.body(data.clone());
        }
        Ok(request)
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let request = cli.request()?;
    let fetcher = Fetcher::from_env();

    let response = if cli.no_retry {
        let timeout = match cli.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => fetcher.config().request_timeout,
        };
        fetcher
            .fetch_with_timeout_cancellable(request, timeout, &cancel)
            .await?
    } else {
        let mut policy = fetcher.retry_policy();
        if let Some(ms) = cli.timeout_ms {
            policy = policy.with_timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = cli.retries {
            policy = policy.with_max_attempts(retries);
        }
        fetcher
            .fetch_with_retries_cancellable(request, &policy, &cancel)
            .await?
    };

    print_response(response, cli.include, cli.fail).await
}

async fn print_response(response: Response, include: bool, fail: bool) -> Result<()> {
    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .context("Failed to read response body")?;

    let mut stdout = std::io::stdout().lock();
    if include {
        writeln!(stdout, "{:?} {}", version, status)?;
        for (name, value) in &headers {
            writeln!(stdout, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        writeln!(stdout)?;
    }
    stdout.write_all(&body)?;
    stdout.flush()?;

    if fail && (status.is_client_error() || status.is_server_error()) {
        bail!("Server responded with HTTP {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    run(cli, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["promptfoo-fetch", "https://example.com"]).unwrap();
        assert_eq!(cli.url, "https://example.com");
        assert_eq!(cli.method, "GET");
        assert!(cli.headers.is_empty());
        assert_eq!(cli.data, None);
        assert_eq!(cli.timeout_ms, None);
        assert_eq!(cli.retries, None);
        assert!(!cli.no_retry);
        assert!(!cli.include);
        assert!(!cli.fail);
    }

    #[test]
    fn test_cli_full_parsing() {
        let cli = Cli::try_parse_from([
            "promptfoo-fetch",
            "-X",
            "post",
            "-H",
            "Content-Type: application/json",
            "-H",
            "X-Trace: 1",
            "-d",
            "{}",
            "--timeout-ms",
            "1500",
            "--retries",
            "2",
            "-i",
            "https://example.com/v1",
        ])
        .unwrap();

        assert_eq!(cli.headers.len(), 2);
        assert_eq!(cli.timeout_ms, Some(1500));
        assert_eq!(cli.retries, Some(2));
        assert!(cli.include);

        let request = cli.request().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://example.com/v1");
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.headers["x-trace"], "1");
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_cli_retries_conflicts_with_no_retry() {
        let result = Cli::try_parse_from([
            "promptfoo-fetch",
            "--retries",
            "3",
            "--no-retry",
            "https://example.com",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_missing_url_fails() {
        assert!(Cli::try_parse_from(["promptfoo-fetch"]).is_err());
    }

    #[test]
    fn test_cli_rejects_header_without_colon() {
        let cli =
            Cli::try_parse_from(["promptfoo-fetch", "-H", "NoColon", "https://example.com"])
                .unwrap();
        let err = cli.request().unwrap_err();
        assert!(err.to_string().contains("expected 'Name: value'"));
    }

    #[test]
    fn test_cli_rejects_invalid_method() {
        let cli =
            Cli::try_parse_from(["promptfoo-fetch", "-X", "GE T", "https://example.com"]).unwrap();
        assert!(cli.request().is_err());
    }
}
