//! Proxy-aware dispatch of a single request.

use log::debug;
use reqwest::Response;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use url::Url;

use super::auth::{strip_auth_from_url, take_credentials};
use super::fetcher::Fetcher;
use super::headers::with_version_header;
use super::proxy::normalize_proxy_url;
use super::{DispatchOptions, FetchError, PreparedRequest, Request, Transport};
use crate::config::FetchConfig;
use crate::runtime::Runtime;

/// Turns a caller request into what goes on the wire.
///
/// Credentials embedded in the URL are removed from it and, unless the
/// caller already set `Authorization`, sent as Basic auth instead. The
/// version header is set last.
pub fn prepare(request: Request) -> Result<PreparedRequest, FetchError> {
    let mut url = Url::parse(&request.url).map_err(|e| {
        FetchError::invalid_configuration(format!(
            "invalid URL '{}': {}",
            strip_auth_from_url(&request.url),
            e
        ))
    })?;

    let mut request = request;
    if let Some(credentials) = take_credentials(&mut url)? {
        if request.headers.contains_key(AUTHORIZATION) {
            debug!("Ignoring URL credentials, request already has an Authorization header");
        } else {
            let mut value = HeaderValue::from_str(&credentials.basic_auth_value())
                .map_err(|e| FetchError::invalid_configuration(format!("invalid credentials: {}", e)))?;
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }
    }

    let request = with_version_header(request);

    Ok(PreparedRequest {
        method: request.method,
        url,
        headers: request.headers,
        body: request.body,
    })
}

/// Connection settings for `target` under `config`.
pub(super) fn dispatch_options(
    target: &Url,
    config: &FetchConfig,
) -> Result<DispatchOptions, FetchError> {
    let proxy = config
        .proxy
        .proxy_for(target)
        .map(normalize_proxy_url)
        .transpose()?;

    Ok(DispatchOptions {
        proxy,
        accept_invalid_certs: !config.reject_unauthorized,
        ca_cert_path: config.ca_cert_path.clone(),
    })
}

impl<T: Transport, R: Runtime> Fetcher<T, R> {
    /// One transport call, no retries. Transport errors are returned as-is.
    pub(super) async fn dispatch(
        &self,
        request: Request,
        config: &FetchConfig,
    ) -> Result<Response, FetchError> {
        let prepared = prepare(request)?;
        let options = dispatch_options(&prepared.url, config)?;

        match &options.proxy {
            Some(proxy) => debug!(
                "{} {} via proxy {}",
                prepared.method,
                prepared.url,
                strip_auth_from_url(proxy)
            ),
            None => debug!("{} {}", prepared.method, prepared.url),
        }
        if options.accept_invalid_certs {
            debug!("TLS certificate verification disabled for this request");
        }

        self.transport.send(prepared, &options).await
    }
}
