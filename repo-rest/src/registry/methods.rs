//! Custom collection and item methods
//!
//! A custom method is registered either as a passthrough, which forwards to
//! the storage method of the same name, or as a handler supplied by the
//! application. Both are resolved at registration into one
//! [`MethodHandler`], so the dispatcher never distinguishes them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::repository::{Collection, Item, Options};

/// Input handed to a custom method
pub struct MethodRequest<'a> {
    /// Canonical (camelCase) method name
    pub name: &'a str,
    pub collection: &'a dyn Collection,
    pub client_collection: &'a dyn Collection,
    pub options: &'a Options,
    pub authorization: Option<&'a str>,
    /// Request body, read for `POST` only
    pub body: Option<&'a Value>,
    /// Resolved item, for item methods
    pub item: Option<&'a mut (dyn Item + 'static)>,
}

impl fmt::Debug for MethodRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRequest")
            .field("name", &self.name)
            .field("collection", &self.collection.name())
            .field("options", &self.options)
            .field("body", &self.body)
            .field("item", &self.item.as_ref().and_then(|i| i.id()))
            .finish_non_exhaustive()
    }
}

/// Result of a custom method
///
/// An absent body is answered with 204.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodResponse {
    pub body: Option<Value>,
    /// Header names are normalized to hyphenated lowercase on the way out
    pub headers: Vec<(String, String)>,
}

impl MethodResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn body(body: impl Into<Value>) -> Self {
        Self {
            body: Some(body.into()),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl From<Option<Value>> for MethodResponse {
    fn from(body: Option<Value>) -> Self {
        Self {
            body,
            headers: Vec::new(),
        }
    }
}

/// Executes a custom method
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, request: MethodRequest<'_>) -> Result<MethodResponse>;
}

/// How a custom method is implemented
#[derive(Clone)]
pub enum Method {
    /// Forward to the storage method of the same name with the decoded options
    Passthrough,
    /// Application-supplied handler
    Handler(Arc<dyn MethodHandler>),
}

impl Method {
    /// Resolve into the callable used at dispatch time
    pub(crate) fn into_handler(self) -> Arc<dyn MethodHandler> {
        match self {
            Method::Passthrough => Arc::new(PassthroughMethod),
            Method::Handler(handler) => handler,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Passthrough => f.write_str("Passthrough"),
            Method::Handler(_) => f.write_str("Handler"),
        }
    }
}

impl From<Arc<dyn MethodHandler>> for Method {
    fn from(handler: Arc<dyn MethodHandler>) -> Self {
        Method::Handler(handler)
    }
}

struct PassthroughMethod;

#[async_trait]
impl MethodHandler for PassthroughMethod {
    async fn call(&self, request: MethodRequest<'_>) -> Result<MethodResponse> {
        let body = match request.item {
            Some(item) => item.call_method(request.name, request.options).await?,
            None => {
                request
                    .collection
                    .call_method(request.name, request.options)
                    .await?
            }
        };
        Ok(body.into())
    }
}

/// Method handler backed by a synchronous closure
pub struct FnMethod<F>(F);

/// Wrap a closure as a custom method handler
///
/// ```rust
/// use repo_rest::registry::{method_fn, MethodResponse};
/// use serde_json::json;
///
/// let echo = method_fn(|request| {
///     Ok(MethodResponse::body(json!({"received": request.body.cloned()}))
///         .with_header("xRequestedMethod", request.name))
/// });
/// # let _ = echo;
/// ```
pub fn method_fn<F>(f: F) -> Method
where
    F: for<'a> Fn(MethodRequest<'a>) -> Result<MethodResponse> + Send + Sync + 'static,
{
    Method::Handler(Arc::new(FnMethod(f)))
}

#[async_trait]
impl<F> MethodHandler for FnMethod<F>
where
    F: for<'a> Fn(MethodRequest<'a>) -> Result<MethodResponse> + Send + Sync,
{
    async fn call(&self, request: MethodRequest<'_>) -> Result<MethodResponse> {
        (self.0)(request)
    }
}
