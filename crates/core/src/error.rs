//! Error types for the heap object model
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::layout::ScalarKind;
use crate::types::{ClassId, Handle};
use thiserror::Error;

/// Result type alias for heap operations
pub type Result<T> = std::result::Result<T, HeapError>;

/// Errors raised by the heap and the object model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Handle does not name a live object of this heap
    #[error("Invalid handle: {0}")]
    InvalidHandle(Handle),

    /// Object exists but has a different category than required
    #[error("Type mismatch at {handle}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Handle that was inspected
        handle: Handle,
        /// Category the caller required
        expected: &'static str,
        /// Category actually found
        found: ClassId,
    },

    /// Body does not fit the class id it was paired with
    #[error("Class {class_id} cannot hold a {body} body")]
    BodyMismatch {
        /// Declared class id
        class_id: ClassId,
        /// Body variant name
        body: &'static str,
    },

    /// Named field does not exist in the category's layout
    #[error("Unknown field '{field}' for {class_id}")]
    UnknownField {
        /// Category whose layout was consulted
        class_id: ClassId,
        /// Requested field name
        field: String,
    },

    /// Scalar field assigned a value of the wrong kind
    #[error("Field '{field}' of {class_id} holds {expected:?} scalars")]
    FieldType {
        /// Category whose layout was consulted
        class_id: ClassId,
        /// Field name
        field: String,
        /// Kind declared in the layout
        expected: ScalarKind,
    },

    /// Category has no canonical form
    #[error("{0} values cannot be canonicalized")]
    NotCanonicalizable(ClassId),

    /// Allocation refused by the heap
    #[error("Out of memory: heap limit of {limit} objects reached")]
    OutOfMemory {
        /// Configured object limit
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_handle() {
        let err = HeapError::InvalidHandle(Handle::from_index(9));
        assert!(err.to_string().contains("@9"));
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = HeapError::TypeMismatch {
            handle: Handle::from_index(1),
            expected: "string",
            found: ClassId::Mint,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected string"));
        assert!(msg.contains("Mint"));
    }

    #[test]
    fn test_error_display_out_of_memory() {
        let err = HeapError::OutOfMemory { limit: 10 };
        assert!(err.to_string().contains("10 objects"));
    }
}
