use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::net::TcpListener;

/// The binary with a predictable environment: no proxies, short waits.
fn fetch_cmd() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("promptfoo-fetch"));
    for var in [
        "HTTPS_PROXY",
        "https_proxy",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
        "no_proxy",
        "PROMPTFOO_MAX_RETRIES",
        "PROMPTFOO_REQUEST_TIMEOUT_MS",
        "PROMPTFOO_RETRY_5XX",
        "PROMPTFOO_INSECURE_SSL",
        "PROMPTFOO_CA_CERT_PATH",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_PROXY", "*")
        .env("PROMPTFOO_REQUEST_BACKOFF_MS", "1");
    cmd
}

#[test]
fn test_prints_response_body() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("ok")
        .expect(1)
        .create();

    fetch_cmd()
        .arg(format!("{}/health", server.url()))
        .assert()
        .success()
        .stdout("ok");

    mock.assert();
}

#[test]
fn test_sends_version_header_and_request_options() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat")
        .match_header("x-promptfoo-version", Matcher::Any)
        .match_header("content-type", "application/json")
        .match_body(r#"{"prompt":"hi"}"#)
        .with_status(201)
        .with_header("x-request-id", "abc")
        .with_body("created")
        .create();

    fetch_cmd()
        .args([
            "-X",
            "POST",
            "-H",
            "Content-Type: application/json",
            "-d",
            r#"{"prompt":"hi"}"#,
            "-i",
        ])
        .arg(format!("{}/v1/chat", server.url()))
        .assert()
        .success()
        .stdout(predicate::str::contains("201 Created"))
        .stdout(predicate::str::contains("x-request-id: abc"))
        .stdout(predicate::str::ends_with("created"));

    mock.assert();
}

#[test]
fn test_url_credentials_become_basic_auth() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/private")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .with_status(200)
        .with_body("secret")
        .create();

    let url = server.url().replacen("http://", "http://user:pass@", 1);
    fetch_cmd()
        .arg(format!("{}/private", url))
        .assert()
        .success()
        .stdout("secret");

    mock.assert();
}

#[test]
fn test_rate_limited_until_retries_run_out() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/limited")
        .with_status(429)
        .with_header("Retry-After", "0")
        .with_body("slow down")
        .expect(2)
        .create();
    let url = format!("{}/limited", server.url());

    // Still limited after the last attempt: the response is handed back
    fetch_cmd()
        .args(["--retries", "2", &url])
        .assert()
        .success()
        .stdout("slow down");
    mock.assert();

    let mock = server
        .mock("GET", "/limited")
        .with_status(429)
        .with_header("Retry-After", "0")
        .expect(2)
        .create();
    fetch_cmd()
        .args(["--retries", "2", "--fail", &url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("429"));
    mock.assert();
}

#[test]
fn test_rate_limit_then_success() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/flaky")
        .with_status(429)
        .with_header("Retry-After", "0")
        .expect(1)
        .create();
    let ok = server
        .mock("GET", "/flaky")
        .with_status(200)
        .with_body("done")
        .expect(1)
        .create();

    // mockito serves the first matching mock until its expectation is met
    fetch_cmd()
        .args(["--retries", "3"])
        .arg(format!("{}/flaky", server.url()))
        .assert()
        .success()
        .stdout("done");

    limited.assert();
    ok.assert();
}

#[test]
fn test_connection_refused_exhausts_retries() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    fetch_cmd()
        .args(["--retries", "2"])
        .arg(format!("http://127.0.0.1:{}/", port))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request failed after 2 retries"));
}

#[test]
fn test_no_retry_sends_single_attempt() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/once")
        .with_status(429)
        .expect(1)
        .create();

    fetch_cmd()
        .arg("--no-retry")
        .arg(format!("{}/once", server.url()))
        .assert()
        .success();

    mock.assert();
}

#[test]
fn test_invalid_header_is_rejected() {
    fetch_cmd()
        .args(["-H", "Bad Header: x", "http://127.0.0.1:9/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_invalid_proxy_is_rejected() {
    fetch_cmd()
        .env_remove("NO_PROXY")
        .env("ALL_PROXY", "http://")
        .arg("http://127.0.0.1:9/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
