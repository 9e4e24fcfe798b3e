//! Repository trait definitions
//!
//! The REST layer never talks to a concrete storage engine. It drives three
//! object-safe capabilities instead:
//!
//! - [`Collection`]: a named set of items with query, bulk and transaction support
//! - [`Item`]: a single record that can be merged, saved, deleted and serialized
//! - [`Transaction`]: a handle that either commits or rolls back the writes made
//!   since it was opened
//!
//! Traits use `async_trait` so collections can be stored as `Arc<dyn Collection>`
//! in the registry and selected per request.
//!
//! # Example
//!
//! ```rust,ignore
//! use repo_rest::repository::{Collection, Item, Options, RepositoryResult};
//!
//! struct PeopleCollection { /* connection pool */ }
//!
//! #[async_trait::async_trait]
//! impl Collection for PeopleCollection {
//!     fn name(&self) -> &str { "people" }
//!
//!     fn create_item(&self, source: serde_json::Value) -> RepositoryResult<Box<dyn Item>> {
//!         // build an unsaved record from client values
//!         todo!()
//!     }
//!
//!     async fn get_item(&self, id: &str, options: &Options)
//!         -> RepositoryResult<Option<Box<dyn Item>>> {
//!         todo!()
//!     }
//!     // ... other required methods
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use super::error::{RepositoryError, RepositoryOperation};
use super::options::Options;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A single stored record
///
/// `serialize` yields the plain value representation used both to build the
/// client view of the item and to send it over the wire.
#[async_trait]
pub trait Item: Send + Sync {
    /// Identity of the item, `None` until the storage assigns one
    fn id(&self) -> Option<&str>;

    /// Tag naming the kind of record, used to pick the client collection for it
    fn type_tag(&self) -> &str;

    /// Plain value representation of the item
    fn serialize(&self) -> Value;

    /// Merge values into the item without persisting them
    ///
    /// Implementations decide which fields are writable; identity and
    /// server-managed fields are expected to survive a merge.
    fn update_value(&mut self, value: Value) -> RepositoryResult<()>;

    /// Persist the item
    async fn save(&mut self, options: &Options) -> RepositoryResult<()>;

    /// Delete the item, returning whether anything was removed
    async fn delete(&mut self, options: &Options) -> RepositoryResult<bool>;

    /// Invoke a named item method
    ///
    /// The default implementation reports the method as unsupported.
    async fn call_method(&mut self, name: &str, options: &Options) -> RepositoryResult<Option<Value>> {
        let _ = options;
        Err(RepositoryError::unsupported(RepositoryOperation::CallMethod, name))
    }
}

/// A named collection of items
#[async_trait]
pub trait Collection: Send + Sync {
    /// Registered name of the collection
    fn name(&self) -> &str;

    /// Type tag carried by items of this collection
    fn type_tag(&self) -> &str {
        self.name()
    }

    /// Build an unsaved item from source values
    ///
    /// An `id` present in `source` must be preserved.
    fn create_item(&self, source: Value) -> RepositoryResult<Box<dyn Item>>;

    /// Rebuild an item from a value produced by [`Item::serialize`]
    fn unserialize_item(&self, value: Value) -> RepositoryResult<Box<dyn Item>> {
        self.create_item(value)
    }

    /// Fetch one item
    ///
    /// With `errorIfMissing` set to `false` a missing item is `Ok(None)`;
    /// otherwise implementations may report a not-found error.
    async fn get_item(&self, id: &str, options: &Options) -> RepositoryResult<Option<Box<dyn Item>>>;

    /// Fetch several items, preserving the order of `ids`
    async fn get_items(&self, ids: &[String], options: &Options) -> RepositoryResult<Vec<Box<dyn Item>>>;

    /// Query items
    async fn find_items(&self, options: &Options) -> RepositoryResult<Vec<Box<dyn Item>>>;

    /// Count items matching the query options
    async fn count_items(&self, options: &Options) -> RepositoryResult<u64>;

    /// Delete items matching the query options, returning how many were removed
    async fn find_and_delete_items(&self, options: &Options) -> RepositoryResult<u64>;

    /// Open a transaction covering subsequent writes to this collection
    async fn begin_transaction(&self) -> RepositoryResult<Box<dyn Transaction>>;

    /// Invoke a named collection method
    async fn call_method(&self, name: &str, options: &Options) -> RepositoryResult<Option<Value>> {
        let _ = options;
        Err(RepositoryError::unsupported(RepositoryOperation::CallMethod, name))
    }
}

/// Open storage transaction
#[async_trait]
pub trait Transaction: Send {
    /// Make the writes performed since the transaction began durable
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    /// Discard the writes performed since the transaction began
    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}

/// Transaction for storage engines without transactional writes
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransaction;

#[async_trait]
impl Transaction for NoopTransaction {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        Ok(())
    }
}
