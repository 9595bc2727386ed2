//! Error types for snapshot passes
//!
//! Every variant aborts the pass that raised it. Nothing is recovered
//! locally and no partially constructed root is ever returned.

use heapsnap_core::{ClassId, HeapError, InvalidTags};
use thiserror::Error;

use crate::config::ConfigError;
use crate::policy::SnapshotKind;

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors raised while writing or reading a snapshot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    /// Stream ended inside a value
    #[error("Unexpected end of stream at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof {
        /// Offset where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
    },

    /// Malformed payload
    #[error("Corrupt snapshot at offset {offset}: {reason}")]
    Corrupt {
        /// Offset of the offending byte
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// Unknown serialization marker
    #[error("Invalid serialization marker {marker} at offset {offset}")]
    InvalidMarker {
        /// Marker byte found
        marker: u8,
        /// Offset of the marker
        offset: usize,
    },

    /// Tag word with reserved bits set
    #[error("Invalid tag word: {0}")]
    InvalidTags(#[from] InvalidTags),

    /// Class identifier outside the known set
    #[error("Unknown class id {0}")]
    UnknownClassId(u32),

    /// Class identifier with no codec
    #[error("No codec registered for {0}")]
    NoCodec(ClassId),

    /// Category never transmissible in this kind
    #[error("{class_id} is forbidden in {kind} snapshots")]
    Forbidden {
        /// Offending category
        class_id: ClassId,
        /// Active kind
        kind: SnapshotKind,
    },

    /// Category reserved but without a codec
    #[error("{class_id} serialization is unimplemented ({kind} snapshot)")]
    Unimplemented {
        /// Offending category
        class_id: ClassId,
        /// Active kind
        kind: SnapshotKind,
    },

    /// Inlined object carries an id out of sequence
    #[error("Object id mismatch: expected {expected}, found {found}")]
    IdMismatch {
        /// Next id the reader would assign
        expected: u32,
        /// Id found in the stream
        found: u32,
    },

    /// Back-reference to an id never assigned
    #[error("Unknown object id {0}")]
    UnknownObjectId(u32),

    /// Back-reference to an id whose object is not yet allocated
    #[error("Object id {0} referenced before it was allocated")]
    UnresolvedReference(u32),

    /// Second registration of the same id
    #[error("Object id {0} registered twice")]
    DuplicateBackReference(u32),

    /// Graph has more objects than the id space allows
    #[error("Object id space exhausted (limit {limit})")]
    IdSpaceExhausted {
        /// Largest assignable id
        limit: u32,
    },

    /// Object graph nested deeper than allowed
    #[error("Nesting deeper than {limit} objects")]
    NestingTooDeep {
        /// Configured depth limit
        limit: usize,
    },

    /// Length prefix larger than allowed
    #[error("Length {length} exceeds limit {limit}")]
    LengthLimit {
        /// Length found in the stream
        length: u64,
        /// Largest accepted length
        limit: u64,
    },

    /// Resident-object reference that the target heap cannot resolve
    #[error("Resident {what} not found: {key}")]
    ResidentNotFound {
        /// Kind of lookup
        what: &'static str,
        /// Key that failed to resolve
        key: String,
    },

    /// Object read in full whose key is already taken in the target heap
    #[error("Resident {what} {key} is already installed")]
    ResidentConflict {
        /// Kind of lookup
        what: &'static str,
        /// Class index or library URL
        key: String,
    },

    /// Source object whose body breaks its category's shape
    #[error("Invalid {class_id} object: {reason}")]
    InvalidObject {
        /// Category of the object
        class_id: ClassId,
        /// What was wrong
        reason: String,
    },

    /// Resident metadata object that cannot be re-transmitted
    #[error("{0} created from a snapshot cannot be transmitted")]
    NotTransmissible(ClassId),

    /// Envelope kind differs from the requested kind
    #[error("Snapshot kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Requested kind
        expected: SnapshotKind,
        /// Kind recorded in the envelope
        found: SnapshotKind,
    },

    /// Envelope does not start with the magic bytes
    #[error("Invalid magic bytes: {found:?}")]
    InvalidMagic {
        /// Bytes found
        found: Vec<u8>,
    },

    /// Envelope version not supported
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    /// Bytes left over after the root object
    #[error("{0} trailing bytes after root object")]
    TrailingBytes(usize),

    /// Stored string hash disagrees with its content
    #[error("String hash mismatch: stored {stored:#x}, computed {computed:#x}")]
    HashMismatch {
        /// Hash in the stream
        stored: u32,
        /// Hash of the content
        computed: u32,
    },

    /// Heap collaborator failure
    #[error("Heap error: {0}")]
    Heap(#[from] HeapError),

    /// Pass configuration rejected before any byte was processed
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SnapshotError {
    /// True for categories that are reserved but lack a codec
    ///
    /// Behaves exactly like `Forbidden`; kept apart for diagnostics.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, SnapshotError::Unimplemented { .. })
    }

    /// True for failures caused by the active kind's allow-list
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            SnapshotError::Forbidden { .. }
                | SnapshotError::Unimplemented { .. }
                | SnapshotError::NotTransmissible(_)
        )
    }

    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        SnapshotError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unimplemented_is_distinguished() {
        let err = SnapshotError::Unimplemented {
            class_id: ClassId::Closure,
            kind: SnapshotKind::Message,
        };
        assert!(err.is_unimplemented());
        assert!(err.is_policy_violation());

        let err = SnapshotError::Forbidden {
            class_id: ClassId::Code,
            kind: SnapshotKind::Full,
        };
        assert!(!err.is_unimplemented());
        assert!(err.to_string().contains("Code(17)"));
    }

    #[test]
    fn test_heap_error_converts() {
        let err: SnapshotError = HeapError::OutOfMemory { limit: 4 }.into();
        assert!(matches!(err, SnapshotError::Heap(_)));
        assert!(err.to_string().contains("4 objects"));
    }

    #[test]
    fn test_error_display_eof() {
        let err = SnapshotError::UnexpectedEof {
            offset: 12,
            needed: 8,
        };
        assert!(err.to_string().contains("offset 12"));
    }
}
