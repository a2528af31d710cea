//! Identifying header attached to every outbound request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::Request;
use crate::VERSION;

/// Name of the header carrying the build version.
pub const VERSION_HEADER: &str = "x-promptfoo-version";

/// Sets the version header, replacing any value the caller supplied for that
/// name under any casing. Every other caller header is left untouched.
pub fn inject_version_header(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static(VERSION_HEADER),
        HeaderValue::from_static(VERSION),
    );
}

pub fn with_version_header(mut request: Request) -> Request {
    inject_version_header(&mut request.headers);
    request
}
