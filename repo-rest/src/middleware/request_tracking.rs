//! Request tracking middleware
//!
//! Every request gets a TypeID request id, echoed back in the response, and a
//! tracing span. Authorization tokens travel in the query string, so the span
//! records the URI with the token parameter redacted, and the
//! `Authorization` header is marked sensitive.

use std::sync::Arc;

use http::{HeaderName, Request, Uri};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    trace::MakeSpan,
};

use crate::ids::MakeTypedRequestId;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Sensitive headers that should be masked in logs
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Placeholder written in place of a redacted query value
const REDACTED: &str = "[redacted]";

/// Create a request ID layer that generates type-safe request IDs.
///
/// Example format: `req_01h455vb4pex5vsknk084sn02q`
pub fn request_id_layer() -> SetRequestIdLayer<MakeTypedRequestId> {
    SetRequestIdLayer::x_request_id(MakeTypedRequestId)
}

/// Copy the request id onto the response
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(SENSITIVE_HEADERS.iter().copied().map(HeaderName::from_static))
}

/// Path and query with the values of `param` replaced
///
/// ```rust
/// use repo_rest::middleware::redact_query;
///
/// let uri = "/people?authorization=tok_1&limit=2".parse().unwrap();
/// assert_eq!(redact_query(&uri, "authorization"), "/people?authorization=[redacted]&limit=2");
/// ```
pub fn redact_query(uri: &Uri, param: &str) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key == param => format!("{key}={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", uri.path(), pairs.join("&"))
}

/// Span factory recording method, redacted URI and request id
#[derive(Debug, Clone)]
pub struct RedactingMakeSpan {
    param: Arc<str>,
}

impl RedactingMakeSpan {
    pub fn new(param: &str) -> Self {
        Self {
            param: Arc::from(param),
        }
    }
}

impl<B> MakeSpan<B> for RedactingMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %redact_query(request.uri(), &self.param),
            request_id,
        )
    }
}
