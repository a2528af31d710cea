//! The request value passed down the fetch chain.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IntoHeaderName};

use super::FetchError;

/// An outbound request as supplied by a caller.
///
/// The URL is kept as a string so that embedded `user:password@` credentials
/// survive until the dispatcher turns them into an `Authorization` header.
/// Requests are cheap to clone (the body is reference counted), which is what
/// lets the retry coordinator replay the exact same request on every attempt.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a header. Repeated names are kept, as the caller supplied them.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends a header from untrusted strings (e.g. command line input).
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, FetchError> {
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
            FetchError::invalid_configuration(format!("invalid header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::from_str(value.trim()).map_err(|e| {
            FetchError::invalid_configuration(format!("invalid value for header '{}': {}", name, e))
        })?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}
