//! Request routing
//!
//! Routing is an ordered table: the first rule that matches the method and
//! path fragments wins. Inside a collection the table is
//!
//! | method       | first fragment        | second fragment  | route               |
//! |--------------|-----------------------|------------------|---------------------|
//! | `GET`        | `count`               | none             | count               |
//! | `POST`       | `get-items`           | none             | bulk get            |
//! | `GET`/`POST` | collection method     | none             | collection method   |
//! | `GET`/`POST` | any                   | item method      | item method         |
//! | `GET`        | id                    | none             | get item            |
//! | `POST`       | none                  | none             | create item         |
//! | `PUT`        | id                    | none             | update item         |
//! | `DELETE`     | id                    | none             | delete item         |
//! | `GET`        | none                  | none             | find items          |
//! | `DELETE`     | none                  | none             | find and delete     |
//!
//! Anything else inside a collection is [`Resolution::Unmatched`]; paths
//! outside every collection are [`Resolution::Miss`] and belong to the next
//! handler.

use std::sync::Arc;

use axum::http::Method;

use crate::path::{split_fragment, Fragments};
use crate::registry::{RegisteredCollection, RegisteredMethod, Registry};

/// Path segment answering the liveness probe
pub const PING: &str = "ping";
/// Path segment of the sign-in routes
pub const AUTHORIZATIONS: &str = "authorizations";
/// Collection verb for counting
pub const COUNT: &str = "count";
/// Collection verb for bulk fetching
pub const GET_ITEMS: &str = "get-items";

/// Operation selected inside a collection
#[derive(Debug, Clone)]
pub enum CollectionRoute<'a> {
    Count,
    GetItems,
    CollectionMethod(RegisteredMethod),
    ItemMethod {
        id: &'a str,
        method: RegisteredMethod,
    },
    GetItem(&'a str),
    CreateItem,
    UpdateItem(&'a str),
    DeleteItem(&'a str),
    FindItems,
    FindAndDeleteItems,
}

impl CollectionRoute<'_> {
    /// Short name used in logs
    pub fn label(&self) -> &str {
        match self {
            Self::Count => "count",
            Self::GetItems => "getItems",
            Self::CollectionMethod(method) | Self::ItemMethod { method, .. } => &method.name,
            Self::GetItem(_) => "getItem",
            Self::CreateItem => "createItem",
            Self::UpdateItem(_) => "updateItem",
            Self::DeleteItem(_) => "deleteItem",
            Self::FindItems => "findItems",
            Self::FindAndDeleteItems => "findAndDeleteItems",
        }
    }
}

/// Selected route
#[derive(Debug, Clone)]
pub enum Route<'a> {
    RepositoryId,
    Ping,
    SignIn,
    VerifyToken(&'a str),
    SignOut(&'a str),
    Collection {
        collection: Arc<RegisteredCollection>,
        operation: CollectionRoute<'a>,
    },
}

/// Outcome of routing a request
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Route(Route<'a>),
    /// A collection matched but no rule did
    Unmatched {
        collection: Arc<RegisteredCollection>,
        /// `PUT` without an id
        missing_id: bool,
    },
    /// Not addressed to this service
    Miss,
}

/// Strip the mount prefix from a path
///
/// Returns `None` when the path lies outside the mount point.
pub fn strip_mount<'a>(mount: &str, path: &'a str) -> Option<&'a str> {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Route a request path (already relative to the mount point)
pub fn resolve<'a>(
    registry: &Registry,
    method: &Method,
    path: &'a str,
    sign_in_enabled: bool,
) -> Resolution<'a> {
    let (head, rest) = split_fragment(path);

    match head {
        "" if rest.is_empty() => {
            if *method == Method::GET {
                Resolution::Route(Route::RepositoryId)
            } else {
                Resolution::Miss
            }
        }
        PING if rest.is_empty() => {
            if *method == Method::GET {
                Resolution::Route(Route::Ping)
            } else {
                Resolution::Miss
            }
        }
        AUTHORIZATIONS if sign_in_enabled => resolve_authorizations(method, rest),
        slug => match registry.get(slug) {
            Some(collection) => resolve_collection(Arc::clone(collection), method, path),
            None => Resolution::Miss,
        },
    }
}

fn resolve_authorizations<'a>(method: &Method, rest: &'a str) -> Resolution<'a> {
    let (token, extra) = split_fragment(rest);
    let route = match (method, token.is_empty(), extra.is_empty()) {
        (m, true, true) if *m == Method::POST => Route::SignIn,
        (m, false, true) if *m == Method::GET => Route::VerifyToken(token),
        (m, false, true) if *m == Method::DELETE => Route::SignOut(token),
        _ => return Resolution::Miss,
    };
    Resolution::Route(route)
}

fn resolve_collection<'a>(
    collection: Arc<RegisteredCollection>,
    method: &Method,
    path: &'a str,
) -> Resolution<'a> {
    let fragments = Fragments::parse(path);
    match match_collection(&collection, method, &fragments) {
        Some(operation) => Resolution::Route(Route::Collection {
            collection,
            operation,
        }),
        None => Resolution::Unmatched {
            missing_id: *method == Method::PUT && fragments.first.is_none(),
            collection,
        },
    }
}

fn match_collection<'a>(
    collection: &RegisteredCollection,
    method: &Method,
    fragments: &Fragments<'a>,
) -> Option<CollectionRoute<'a>> {
    if !fragments.rest.is_empty() {
        return None;
    }

    let get = *method == Method::GET;
    let post = *method == Method::POST;
    let put = *method == Method::PUT;
    let delete = *method == Method::DELETE;

    match (fragments.first, fragments.second) {
        (Some(COUNT), None) if get => Some(CollectionRoute::Count),
        (Some(GET_ITEMS), None) if post => Some(CollectionRoute::GetItems),
        (Some(first), None) if get || post => {
            if let Some(registered) = collection.collection_method(first) {
                Some(CollectionRoute::CollectionMethod(registered.clone()))
            } else if get {
                Some(CollectionRoute::GetItem(first))
            } else {
                None
            }
        }
        (Some(id), Some(second)) if get || post => collection
            .item_method(second)
            .map(|registered| CollectionRoute::ItemMethod {
                id,
                method: registered.clone(),
            }),
        (None, None) if post => Some(CollectionRoute::CreateItem),
        (Some(id), None) if put => Some(CollectionRoute::UpdateItem(id)),
        (Some(id), None) if delete => Some(CollectionRoute::DeleteItem(id)),
        (None, None) if get => Some(CollectionRoute::FindItems),
        (None, None) if delete => Some(CollectionRoute::FindAndDeleteItems),
        _ => None,
    }
}
