//! Response writing

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::naming::kebab_case;
use crate::registry::MethodResponse;

/// Body of a [`Reply`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Json(Value),
    Text(String),
}

/// Outcome of a dispatched request, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: ReplyBody,
    pub headers: Vec<(String, String)>,
}

impl Reply {
    fn new(status: StatusCode, body: ReplyBody) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::OK, ReplyBody::Json(body.into()))
    }

    pub fn created(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::CREATED, ReplyBody::Json(body.into()))
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, ReplyBody::Empty)
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ReplyBody::Text(body.into()))
    }

    /// Custom method result: no body is 204, otherwise 201 for `POST` and 200 else
    pub fn from_method(response: MethodResponse, is_post: bool) -> Self {
        let mut reply = match response.body {
            None => Self::no_content(),
            Some(body) if is_post => Self::created(body),
            Some(body) => Self::ok(body),
        };
        reply.headers = response.headers;
        reply
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ReplyBody::Empty => self.status.into_response(),
            ReplyBody::Json(value) => (self.status, Json(value)).into_response(),
            ReplyBody::Text(text) => (self.status, text).into_response(),
        };

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            let hyphenated = kebab_case(&name);
            match (
                HeaderName::from_bytes(hyphenated.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "skipping invalid response header"),
            }
        }

        response
    }
}
