//! Time-sortable identifiers
//!
//! Identifiers follow the [TypeID](https://github.com/jetpack-io/typeid) format:
//! a lowercase prefix naming the kind of thing, an underscore, and a base32
//! UUIDv7 suffix. Two kinds are generated here:
//!
//! - request ids (`req_…`) stamped on every HTTP request for log correlation
//! - item ids (`<type tag>_…`) assigned by the in-memory store, which sort in
//!   creation order
//!
//! Session tokens (`tok_…`) share the format but use a random UUIDv4.
//!
//! ```rust
//! use repo_rest::ids::{item_id, RequestId};
//!
//! assert!(RequestId::new().as_str().starts_with("req_"));
//! assert!(item_id("people").starts_with("people_"));
//! ```

use std::fmt;

use http::Request;
use mti::prelude::*;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};

/// Prefix used when a type tag has no usable characters
const FALLBACK_PREFIX: &str = "item";

/// Prefix of session tokens
const SESSION_PREFIX: &str = "tok";

/// Longest prefix a TypeID accepts
const MAX_PREFIX_LEN: usize = 63;

/// Identifier attached to an HTTP request
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    pub const PREFIX: &'static str = "req";

    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generate a new item id for the given type tag
///
/// The tag is reduced to a valid TypeID prefix: lowercased, with anything
/// outside `a-z` turned into `_` and surrounding underscores trimmed.
#[must_use]
pub fn item_id(type_tag: &str) -> String {
    prefix_for(type_tag).as_str().create_type_id::<V7>().to_string()
}

/// Generate an unguessable session token
///
/// Tokens use a random UUIDv4 suffix, so unlike item ids they carry no
/// creation time.
#[must_use]
pub fn session_token() -> String {
    SESSION_PREFIX.create_type_id::<V4>().to_string()
}

fn prefix_for(type_tag: &str) -> String {
    let mapped: String = type_tag
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_ascii_lowercase() { c } else { '_' })
        .take(MAX_PREFIX_LEN)
        .collect();
    let trimmed = mapped.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `MakeRequestId` for tower-http that stamps requests with a [`RequestId`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = RequestId::new();
        let header_value = http::HeaderValue::from_str(id.as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}
