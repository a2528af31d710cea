//! The single-exchange transport underneath the fetch chain.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Certificate, Client, Method, Proxy, Response};
use std::path::PathBuf;
use url::Url;

use super::FetchError;
use super::auth::strip_auth_from_url;

/// A request that has been through credential extraction and header
/// injection and is ready to go on the wire.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Per-call connection settings the transport must honour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Proxy to tunnel through; `None` connects directly.
    pub proxy: Option<String>,
    /// Skip certificate verification for this request only.
    pub accept_invalid_certs: bool,
    /// Extra PEM root certificate to trust.
    pub ca_cert_path: Option<PathBuf>,
}

/// Performs exactly one request/response exchange. Implementations must not
/// retry and must report failures as [`FetchError::Transport`] (or
/// [`FetchError::InvalidConfiguration`] when `options` cannot be honoured).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: PreparedRequest,
        options: &DispatchOptions,
    ) -> Result<Response, FetchError>;
}

/// [`Transport`] backed by reqwest.
///
/// A client is built for each call from its [`DispatchOptions`], so relaxed
/// TLS settings never leak into other requests in the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub async fn build_client(options: &DispatchOptions) -> Result<Client, FetchError> {
        // Only the proxy resolved from our configuration applies; reqwest's
        // own environment lookup is disabled.
        let mut builder = Client::builder().no_proxy();

        if let Some(proxy) = &options.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|e| {
                FetchError::invalid_configuration(format!(
                    "invalid proxy URL '{}': {}",
                    strip_auth_from_url(proxy),
                    e
                ))
            })?;
            builder = builder.proxy(proxy);
        }

        if options.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &options.ca_cert_path {
            let pem = tokio::fs::read(path).await.map_err(|e| {
                FetchError::invalid_configuration(format!(
                    "cannot read CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                FetchError::invalid_configuration(format!(
                    "invalid CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| FetchError::invalid_configuration(format!("cannot build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(
        &self,
        request: PreparedRequest,
        options: &DispatchOptions,
    ) -> Result<Response, FetchError> {
        let client = Self::build_client(options).await?;

        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(FetchError::transport)?;
        debug!("Received HTTP {}", response.status());

        Ok(response)
    }
}
