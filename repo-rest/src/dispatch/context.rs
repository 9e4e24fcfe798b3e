//! Per-request state and query decoding

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Query;
use axum::http::{header, HeaderMap, Method, Uri};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::RegisteredCollection;
use crate::repository::{Collection, Options};

/// Options and token decoded from a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedQuery {
    pub options: Options,
    pub authorization: Option<String>,
}

/// Turns the query string (and headers) into options and an authorization token
pub trait QueryDecoder: Send + Sync {
    fn decode(&self, uri: &Uri, headers: &HeaderMap) -> Result<DecodedQuery>;
}

/// Default decoder: query values are JSON when they parse as JSON, else strings
///
/// `?limit=10&reverse=true&start=b` decodes to
/// `{"limit": 10, "reverse": true, "start": "b"}`. The token comes from the
/// authorization parameter, falling back to the `Authorization` header with
/// any `Bearer ` prefix removed.
#[derive(Debug, Clone)]
pub struct JsonQueryDecoder {
    authorization_param: String,
}

impl JsonQueryDecoder {
    pub fn new(authorization_param: impl Into<String>) -> Self {
        Self {
            authorization_param: authorization_param.into(),
        }
    }
}

impl Default for JsonQueryDecoder {
    fn default() -> Self {
        Self::new("authorization")
    }
}

impl QueryDecoder for JsonQueryDecoder {
    fn decode(&self, uri: &Uri, headers: &HeaderMap) -> Result<DecodedQuery> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;

        let mut decoded = DecodedQuery::default();
        for (key, raw) in pairs {
            if key == self.authorization_param {
                decoded.authorization = Some(raw);
                continue;
            }
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            decoded.options.insert(key, value);
        }

        if decoded.authorization.is_none() {
            decoded.authorization = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty());
        }

        Ok(decoded)
    }
}

enum BodyState {
    Unread(Body),
    Read(Option<Value>),
}

/// Read a JSON body; an empty body is `None`
pub(crate) async fn read_json_body(body: Body, limit: usize) -> Result<Option<Value>> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| Error::BadRequest(format!("failed to read request body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::BadRequest(format!("request body is not valid JSON: {e}")))
}

/// Borrowed view of a request once its body has been dealt with
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub collection: &'a RegisteredCollection,
    pub options: &'a Options,
    pub authorization: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn storage(&self) -> &'a dyn Collection {
        self.collection.storage().as_ref()
    }

    pub fn client(&self) -> &'a dyn Collection {
        self.collection.client().as_ref()
    }
}

/// State of one collection request
pub struct RequestContext {
    pub method: Method,
    pub collection: Arc<RegisteredCollection>,
    pub options: Options,
    pub authorization: Option<String>,
    body: BodyState,
    body_limit: usize,
}

impl RequestContext {
    pub fn new(
        method: Method,
        collection: Arc<RegisteredCollection>,
        query: DecodedQuery,
        body: Body,
        body_limit: usize,
    ) -> Self {
        Self {
            method,
            collection,
            options: query.options,
            authorization: query.authorization,
            body: BodyState::Unread(body),
            body_limit,
        }
    }

    /// Borrow everything but the body
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            collection: &self.collection,
            options: &self.options,
            authorization: self.authorization.as_deref(),
        }
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// Read the body on first use; later calls return the same value
    pub async fn body(&mut self) -> Result<Option<&Value>> {
        let state = std::mem::replace(&mut self.body, BodyState::Read(None));
        self.body = match state {
            BodyState::Unread(body) => BodyState::Read(read_json_body(body, self.body_limit).await?),
            read => read,
        };
        match &self.body {
            BodyState::Read(value) => Ok(value.as_ref()),
            BodyState::Unread(_) => Ok(None),
        }
    }

    /// Take ownership of the body, reading it if needed
    pub async fn take_body(&mut self) -> Result<Option<Value>> {
        self.body().await?;
        match std::mem::replace(&mut self.body, BodyState::Read(None)) {
            BodyState::Read(value) => Ok(value),
            BodyState::Unread(_) => Ok(None),
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("collection", &self.collection.name())
            .field("options", &self.options)
            .field("authorized", &self.authorization.is_some())
            .field("body_read", &matches!(self.body, BodyState::Read(_)))
            .finish()
    }
}
