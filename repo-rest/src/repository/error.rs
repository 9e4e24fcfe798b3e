//! Repository error types
//!
//! Storage backends report failures through [`RepositoryError`], which keeps
//! the operation, a coarse error kind, and the entity involved so the REST
//! layer can map it onto a status code without inspecting messages.
//!
//! # Example
//!
//! ```rust
//! use repo_rest::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("people", "ppl_123");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert_eq!(error.entity_id.as_deref(), Some("ppl_123"));
//! ```

use std::fmt;

/// Storage operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Fetching a single item by id
    GetItem,
    /// Fetching several items by id
    GetItems,
    /// Querying items with options
    FindItems,
    /// Counting items matching options
    CountItems,
    /// Bulk deleting items matching options
    FindAndDeleteItems,
    /// Instantiating an item from source values
    CreateItem,
    /// Persisting an item
    SaveItem,
    /// Deleting an item
    DeleteItem,
    /// Merging values into an item
    UpdateValue,
    /// Opening, committing or rolling back a transaction
    Transaction,
    /// Invoking a named custom method
    CallMethod,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetItem => write!(f, "get_item"),
            Self::GetItems => write!(f, "get_items"),
            Self::FindItems => write!(f, "find_items"),
            Self::CountItems => write!(f, "count_items"),
            Self::FindAndDeleteItems => write!(f, "find_and_delete_items"),
            Self::CreateItem => write!(f, "create_item"),
            Self::SaveItem => write!(f, "save_item"),
            Self::DeleteItem => write!(f, "delete_item"),
            Self::UpdateValue => write!(f, "update_value"),
            Self::Transaction => write!(f, "transaction"),
            Self::CallMethod => write!(f, "call_method"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Item was not found
    NotFound,
    /// Item already exists (duplicate key)
    AlreadyExists,
    /// Storage constraint violation
    ConstraintViolation,
    /// Source values were rejected
    ValidationFailed,
    /// The collection or item does not implement the requested method
    Unsupported,
    /// The transaction could not be opened, committed or rolled back
    TransactionFailed,
    /// Storage backend is temporarily unreachable
    Unavailable,
    /// Serialization or deserialization error
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::TransactionFailed => write!(f, "transaction_failed"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use repo_rest::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::unsupported(RepositoryOperation::CallMethod, "countRetired");
/// assert!(!error.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The collection or type tag involved
    pub entity_type: Option<String>,
    /// The id of the item involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with item context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::GetItem,
            RepositoryErrorKind::NotFound,
            "Item not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create a validation failed error
    pub fn validation_failed(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create an error for a method the storage does not implement
    pub fn unsupported(operation: RepositoryOperation, method: impl AsRef<str>) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Unsupported,
            format!("Method '{}' is not supported", method.as_ref()),
        )
    }

    /// Create a transaction failure
    pub fn transaction_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Transaction,
            RepositoryErrorKind::TransactionFailed,
            message,
        )
    }

    /// Create an unavailable error
    pub fn unavailable(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Unavailable, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Add item context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is transient
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::Unavailable | RepositoryErrorKind::TransactionFailed
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(RepositoryOperation::UpdateValue, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::GetItem), "get_item");
        assert_eq!(format!("{}", RepositoryOperation::FindItems), "find_items");
        assert_eq!(
            format!("{}", RepositoryOperation::FindAndDeleteItems),
            "find_and_delete_items"
        );
        assert_eq!(format!("{}", RepositoryOperation::Transaction), "transaction");
        assert_eq!(format!("{}", RepositoryOperation::CallMethod), "call_method");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(format!("{}", RepositoryErrorKind::Unsupported), "unsupported");
        assert_eq!(
            format!("{}", RepositoryErrorKind::TransactionFailed),
            "transaction_failed"
        );
        assert_eq!(format!("{}", RepositoryErrorKind::Other), "other");
    }

    #[test]
    fn test_not_found_carries_entity() {
        let error = RepositoryError::not_found("people", "ppl_1");
        assert_eq!(error.operation, RepositoryOperation::GetItem);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type.as_deref(), Some("people"));
        assert_eq!(error.entity_id.as_deref(), Some("ppl_1"));
    }

    #[test]
    fn test_unsupported_names_method() {
        let error = RepositoryError::unsupported(RepositoryOperation::CallMethod, "archive");
        assert_eq!(error.kind, RepositoryErrorKind::Unsupported);
        assert!(error.message.contains("archive"));
    }

    #[test]
    fn test_is_retriable() {
        assert!(RepositoryError::unavailable(RepositoryOperation::FindItems, "down").is_retriable());
        assert!(RepositoryError::transaction_failed("conflict").is_retriable());
        assert!(!RepositoryError::not_found("people", "1").is_retriable());
        assert!(
            !RepositoryError::validation_failed(RepositoryOperation::CreateItem, "bad")
                .is_retriable()
        );
    }

    #[test]
    fn test_display_with_entity() {
        let display = format!("{}", RepositoryError::not_found("people", "ppl_1"));
        assert!(display.contains("not_found"));
        assert!(display.contains("get_item"));
        assert!(display.contains("[people: ppl_1]"));
    }

    #[test]
    fn test_display_without_entity() {
        let display = format!("{}", RepositoryError::transaction_failed("lock poisoned"));
        assert!(display.contains("transaction_failed"));
        assert!(!display.contains('['));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: RepositoryError = json_err.into();
        assert_eq!(error.kind, RepositoryErrorKind::SerializationError);
    }
}
