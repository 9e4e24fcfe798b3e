//! Storage abstractions consumed by the REST layer
//!
//! This module provides the capabilities a storage engine implements to be
//! exposed over HTTP, along with the options map and the structured error
//! type shared by every backend.
//!
//! # Features
//!
//! - **Collections**: [`Collection`] for fetching, querying, counting and bulk deletion
//! - **Items**: [`Item`] for merging, saving, deleting and serializing records
//! - **Transactions**: [`Transaction`] wrapping every mutation
//! - **Options**: [`Options`], typed values decoded from the query string
//! - **Errors**: [`RepositoryError`] with operation and kind context

mod error;
mod options;
mod traits;

// Re-export all public types
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use options::{Options, CREATE_IF_MISSING, ERROR_IF_MISSING};
pub use traits::{Collection, Item, NoopTransaction, RepositoryResult, Transaction};
