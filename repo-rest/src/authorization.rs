//! Authorization gate and credential handling
//!
//! Before any data is released or mutated, the dispatcher asks the gate
//! whether the operation may proceed. The collection's own [`Authorizer`] is
//! consulted first, then the service-wide default; with neither configured
//! every operation is allowed. A `false` answer fails the request with 403.
//!
//! Answers are never cached: every request is checked again.
//!
//! Sign-in and sign-out are delegated to a [`CredentialHandler`], which issues
//! the tokens clients later send as the `authorization` query parameter.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::ids::session_token;
use crate::repository::{Collection, Item, Options};

/// Operation submitted to the gate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    GetItem,
    PutItem,
    DeleteItem,
    FindItems,
    CountItems,
    FindAndDeleteItems,
    GetItems,
    /// Custom collection or item method, by canonical (camelCase) name
    Custom(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GetItem => "getItem",
            Self::PutItem => "putItem",
            Self::DeleteItem => "deleteItem",
            Self::FindItems => "findItems",
            Self::CountItems => "countItems",
            Self::FindAndDeleteItems => "findAndDeleteItems",
            Self::GetItems => "getItems",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an authorizer may base its decision on
#[derive(Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    /// Decoded token, if the client sent one
    pub authorization: Option<&'a str>,
    pub collection: &'a dyn Collection,
    pub client_collection: &'a dyn Collection,
    pub operation: &'a Operation,
    pub options: &'a Options,
    /// Item the operation targets, once resolved
    pub item: Option<&'a dyn Item>,
}

impl fmt::Debug for AuthorizationRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("authorized", &self.authorization.is_some())
            .field("collection", &self.collection.name())
            .field("operation", &self.operation)
            .field("item", &self.item.and_then(|i| i.id()))
            .finish_non_exhaustive()
    }
}

/// Decides whether an operation may proceed
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: AuthorizationRequest<'_>) -> Result<bool>;
}

/// Authorizer backed by a synchronous closure
pub struct FnAuthorizer<F>(F);

/// Wrap a closure as an [`Authorizer`]
///
/// ```rust
/// use repo_rest::authorization::{authorizer_fn, Operation};
///
/// // read-only unless a token is present
/// let read_only = authorizer_fn(|request| {
///     Ok(request.authorization.is_some()
///         || matches!(request.operation, Operation::GetItem | Operation::FindItems))
/// });
/// # let _ = read_only;
/// ```
pub fn authorizer_fn<F>(f: F) -> Arc<dyn Authorizer>
where
    F: Fn(AuthorizationRequest<'_>) -> Result<bool> + Send + Sync + 'static,
{
    Arc::new(FnAuthorizer(f))
}

#[async_trait]
impl<F> Authorizer for FnAuthorizer<F>
where
    F: Fn(AuthorizationRequest<'_>) -> Result<bool> + Send + Sync,
{
    async fn authorize(&self, request: AuthorizationRequest<'_>) -> Result<bool> {
        (self.0)(request)
    }
}

/// Applies the collection authorizer, else the default, else allows
#[derive(Clone, Default)]
pub struct AuthorizationGate {
    default: Option<Arc<dyn Authorizer>>,
}

impl AuthorizationGate {
    pub fn new(default: Option<Arc<dyn Authorizer>>) -> Self {
        Self { default }
    }

    /// Check an operation, failing with [`Error::Forbidden`] on refusal
    pub async fn check(
        &self,
        collection_authorizer: Option<&Arc<dyn Authorizer>>,
        request: AuthorizationRequest<'_>,
    ) -> Result<()> {
        let Some(authorizer) = collection_authorizer.or(self.default.as_ref()) else {
            return Ok(());
        };

        if authorizer.authorize(request).await? {
            return Ok(());
        }

        tracing::warn!(
            collection = request.collection.name(),
            operation = %request.operation,
            item = ?request.item.and_then(|i| i.id()),
            "authorization refused"
        );
        Err(Error::Forbidden(format!(
            "{} on {} is not authorized",
            request.operation,
            request.collection.name()
        )))
    }
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// Issues, verifies and revokes authorization tokens
#[async_trait]
pub trait CredentialHandler: Send + Sync {
    /// Exchange credentials for a token; `None` refuses the sign-in
    async fn sign_in(&self, credentials: Value) -> Result<Option<String>>;

    /// Whether a token is currently valid
    async fn verify(&self, token: &str) -> Result<bool>;

    /// Revoke a token; unknown tokens are ignored
    async fn sign_out(&self, token: &str) -> Result<()>;
}

/// Credential handler over a fixed account table
///
/// Expects `{"username": …, "password": …}` credentials and keeps issued
/// tokens in memory. Intended for tests and demos.
#[derive(Default)]
pub struct InMemoryCredentials {
    accounts: HashMap<String, String>,
    tokens: RwLock<HashSet<String>>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), password.into());
        self
    }
}

#[async_trait]
impl CredentialHandler for InMemoryCredentials {
    async fn sign_in(&self, credentials: Value) -> Result<Option<String>> {
        let field = |name: &str| credentials.get(name).and_then(Value::as_str);
        let (Some(username), Some(password)) = (field("username"), field("password")) else {
            tracing::debug!("sign-in refused, credentials incomplete");
            return Ok(None);
        };

        if self.accounts.get(username).map(String::as_str) != Some(password) {
            tracing::debug!(username, "sign-in refused");
            return Ok(None);
        }

        let token = session_token();
        self.tokens.write().await.insert(token.clone());
        Ok(Some(token))
    }

    async fn verify(&self, token: &str) -> Result<bool> {
        Ok(self.tokens.read().await.contains(token))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        self.tokens.write().await.remove(token);
        Ok(())
    }
}
