//! Request dispatch
//!
//! Turns one HTTP request into one repository operation:
//!
//! ```text
//! request → fragments → route → authorize → will-event → operation → did-event → response
//! ```
//!
//! Requests that are not addressed to a registered collection (or to one of
//! the top-level routes) are handed back untouched so the next handler can
//! serve them.

mod context;
mod executor;
mod response;
mod route;
mod service;

#[cfg(all(test, feature = "memory"))]
mod tests;

pub use context::{DecodedQuery, JsonQueryDecoder, QueryDecoder, RequestContext, Scope};
pub use executor::{in_transaction, Executor};
pub use response::{Reply, ReplyBody};
pub use route::{
    resolve, strip_mount, CollectionRoute, Resolution, Route, AUTHORIZATIONS, COUNT, GET_ITEMS,
    PING,
};
pub use service::{dispatch_middleware, RestService, RestServiceBuilder};
