//! The REST service and its axum integration

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

use super::context::{read_json_body, JsonQueryDecoder, QueryDecoder, RequestContext};
use super::executor::Executor;
use super::response::Reply;
use super::route::{resolve, strip_mount, Resolution, Route};
use crate::authorization::{AuthorizationGate, Authorizer, CredentialHandler};
use crate::config::{RestConfig, UnmatchedPolicy};
use crate::error::{Error, Result};
use crate::registry::{RegisteredCollection, Registry};

/// Dispatches requests onto registered collections
///
/// Build one with [`RestService::builder`], then either call
/// [`into_router`](Self::into_router) or layer [`dispatch_middleware`] onto
/// an existing router so unmatched requests reach its routes.
pub struct RestService {
    config: RestConfig,
    registry: Registry,
    gate: AuthorizationGate,
    credentials: Option<Arc<dyn CredentialHandler>>,
    decoder: Arc<dyn QueryDecoder>,
}

impl RestService {
    pub fn builder() -> RestServiceBuilder {
        RestServiceBuilder::default()
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Answer a request, or hand it back when it is not addressed to this service
    pub async fn respond(&self, request: Request) -> std::result::Result<Response, Request> {
        let path = request.uri().path().to_string();
        let Some(relative) = strip_mount(&self.config.mount_path, &path) else {
            return Err(request);
        };

        let resolution = resolve(
            &self.registry,
            request.method(),
            relative,
            self.credentials.is_some(),
        );
        let route = match resolution {
            Resolution::Route(route) => route,
            Resolution::Miss => {
                tracing::trace!(path = %path, "passing request through");
                return Err(request);
            }
            Resolution::Unmatched {
                collection,
                missing_id,
            } => {
                return match self.config.unmatched {
                    UnmatchedPolicy::PassThrough => {
                        tracing::debug!(
                            collection = collection.name(),
                            method = %request.method(),
                            path = %path,
                            "no collection route matched, passing through"
                        );
                        Err(request)
                    }
                    UnmatchedPolicy::Strict if missing_id => Ok(Error::BadRequest(format!(
                        "{} requires an item id",
                        request.method()
                    ))
                    .into_response()),
                    UnmatchedPolicy::Strict => Ok(Error::MethodNotSupported(format!(
                        "{} {path} is not supported by {}",
                        request.method(),
                        collection.name()
                    ))
                    .into_response()),
                };
            }
        };

        let response = match self.run(route, request).await {
            Ok(reply) => reply.into_response(),
            Err(error) => error.into_response(),
        };
        Ok(response)
    }

    async fn run(&self, route: Route<'_>, request: Request) -> Result<Reply> {
        let (parts, body) = request.into_parts();
        let limit = self.config.body_limit_bytes();

        match route {
            Route::RepositoryId => Ok(Reply::ok(json!({
                "repositoryId": self.config.repository_id
            }))),
            Route::Ping => Ok(Reply::text("pong")),
            Route::SignIn => {
                // unreadable credentials are refused like wrong ones
                let credentials = match read_json_body(body, limit).await {
                    Ok(credentials) => credentials.unwrap_or(Value::Null),
                    Err(e) => {
                        tracing::debug!(error = %e, "unreadable credentials");
                        Value::Null
                    }
                };
                match self.credentials()?.sign_in(credentials).await? {
                    Some(token) => Ok(Reply::created(token)),
                    None => Err(Error::Forbidden("invalid credentials".to_string())),
                }
            }
            Route::VerifyToken(token) => {
                if self.credentials()?.verify(token).await? {
                    Ok(Reply::no_content())
                } else {
                    Err(Error::Forbidden("token is not valid".to_string()))
                }
            }
            Route::SignOut(token) => {
                self.credentials()?.sign_out(token).await?;
                Ok(Reply::no_content())
            }
            Route::Collection {
                collection,
                operation,
            } => {
                let query = self.decoder.decode(&parts.uri, &parts.headers)?;
                let mut ctx = RequestContext::new(parts.method, collection, query, body, limit);
                Executor::new(&self.registry, &self.gate, &self.config)
                    .execute(&mut ctx, operation)
                    .await
            }
        }
    }

    fn credentials(&self) -> Result<&Arc<dyn CredentialHandler>> {
        self.credentials
            .as_ref()
            .ok_or_else(|| Error::Misconfigured("no credential handler configured".to_string()))
    }

    /// Router answering every request, with a JSON 404 for unmatched paths
    pub fn into_router(self) -> Router {
        let service = Arc::new(self);
        Router::new()
            .fallback(not_found)
            .layer(from_fn_with_state(service, dispatch_middleware))
    }
}

impl fmt::Debug for RestService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestService")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("gate", &self.gate)
            .field("sign_in", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// axum middleware running [`RestService::respond`]; misses continue to `next`
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use axum::{middleware::from_fn_with_state, routing::get, Router};
/// use repo_rest::dispatch::{dispatch_middleware, RestService};
///
/// # fn build() -> repo_rest::Result<Router> {
/// let service = Arc::new(RestService::builder().build()?);
/// let app = Router::new()
///     .route("/health", get(|| async { "ok" }))
///     .layer(from_fn_with_state(service, dispatch_middleware));
/// # Ok(app)
/// # }
/// ```
pub async fn dispatch_middleware(
    State(service): State<Arc<RestService>>,
    request: Request,
    next: Next,
) -> Response {
    match service.respond(request).await {
        Ok(response) => response,
        Err(request) => next.run(request).await,
    }
}

async fn not_found(uri: Uri) -> Error {
    Error::NotFound(format!("no route for {}", uri.path()))
}

/// Builder for [`RestService`]
#[derive(Default)]
pub struct RestServiceBuilder {
    config: RestConfig,
    registry: Registry,
    pending: Vec<RegisteredCollection>,
    default_authorizer: Option<Arc<dyn Authorizer>>,
    credentials: Option<Arc<dyn CredentialHandler>>,
    decoder: Option<Arc<dyn QueryDecoder>>,
}

impl RestServiceBuilder {
    #[must_use]
    pub fn config(mut self, config: RestConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an already assembled registry
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a collection; slug conflicts are reported by [`build`](Self::build)
    #[must_use]
    pub fn collection(mut self, collection: RegisteredCollection) -> Self {
        self.pending.push(collection);
        self
    }

    /// Authorizer for collections that do not declare their own
    #[must_use]
    pub fn authorize(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.default_authorizer = Some(authorizer);
        self
    }

    /// Enable the `/authorizations` routes
    #[must_use]
    pub fn credentials(mut self, handler: Arc<dyn CredentialHandler>) -> Self {
        self.credentials = Some(handler);
        self
    }

    /// Replace the default [`JsonQueryDecoder`]
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn QueryDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<RestService> {
        let mut registry = self.registry;
        for collection in self.pending {
            registry.register(collection)?;
        }

        if self.config.sign_in && self.credentials.is_none() {
            return Err(Error::Misconfigured(
                "rest.sign_in is enabled but no credential handler was supplied".to_string(),
            ));
        }

        let decoder = self.decoder.unwrap_or_else(|| {
            Arc::new(JsonQueryDecoder::new(self.config.authorization_param.clone()))
        });

        tracing::info!(
            mount_path = %self.config.mount_path,
            collections = registry.len(),
            sign_in = self.credentials.is_some(),
            "REST service configured"
        );

        Ok(RestService {
            config: self.config,
            registry,
            gate: AuthorizationGate::new(self.default_authorizer),
            credentials: self.credentials,
            decoder,
        })
    }
}

impl From<RestService> for Router {
    fn from(service: RestService) -> Self {
        service.into_router()
    }
}

