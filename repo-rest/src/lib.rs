//! # repo-rest
//!
//! Generic, introspectable REST surface over a repository of collections of items.
//!
//! An HTTP request (method, path, query, body) is turned into exactly one
//! repository operation, run through an authorization gate and an event
//! pipeline, and written back as status, headers and body.
//!
//! ## Features
//!
//! - **Routing**: `/{collection}[/{id}][/{method}]`, `count`, `get-items`, `ping`
//! - **Authorization**: per-collection or service-wide authorizers, checked before any data moves
//! - **Events**: ordered `will*`/`did*` listeners that can rewrite items in flight
//! - **Transactions**: every mutation runs inside one storage transaction
//! - **Custom methods**: passthrough to storage or application handlers
//! - **Pass-through**: requests not addressed to a collection reach the next handler
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repo_rest::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let people = RegisteredCollection::builder(Arc::new(MemoryCollection::new("people")))
//!         .on(EventKind::DidPutItem, listener_fn(|event| {
//!             tracing::info!(item = ?event.item().and_then(|i| i.id()), "saved");
//!             Ok(())
//!         }))
//!         .build();
//!
//!     let service = RestService::builder()
//!         .config(config.rest.clone())
//!         .collection(people)
//!         .build()?;
//!
//!     Server::new(config).serve(service).await
//! }
//! ```

pub mod authorization;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ids;
pub mod middleware;
pub mod naming;
pub mod observability;
pub mod path;
pub mod registry;
pub mod repository;
pub mod server;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::authorization::{
        authorizer_fn, AuthorizationGate, AuthorizationRequest, Authorizer, CredentialHandler,
        InMemoryCredentials, Operation,
    };
    pub use crate::config::{
        Config, DeletionReport, MiddlewareConfig, RestConfig, ServiceConfig, UnmatchedPolicy,
        UpsertPolicy,
    };
    pub use crate::dispatch::{
        dispatch_middleware, JsonQueryDecoder, QueryDecoder, RestService, RestServiceBuilder,
    };
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::events::{listener_fn, Event, EventKind, EventListener, EventSubject};
    pub use crate::ids::{MakeTypedRequestId, RequestId};
    pub use crate::middleware::{
        request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
        SENSITIVE_HEADERS,
    };
    pub use crate::observability::init_tracing;
    pub use crate::registry::{
        method_fn, Method, MethodHandler, MethodRequest, MethodResponse, RegisteredCollection,
        Registry,
    };
    pub use crate::repository::{
        Collection, Item, NoopTransaction, Options, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult, Transaction, CREATE_IF_MISSING, ERROR_IF_MISSING,
    };
    pub use crate::server::Server;

    #[cfg(feature = "memory")]
    pub use crate::memory::{Document, MemoryCollection};

    pub use axum::Router;
}
