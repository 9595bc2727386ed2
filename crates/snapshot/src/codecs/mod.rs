//! Per-category codecs
//!
//! Each codec reads its payload in the same order it writes it. Readers
//! consume scalars and length prefixes first, allocate the object with null
//! pointer slots, register its id, then read the pointers and patch them in.

pub mod collection;
pub mod executable;
pub mod metadata;
pub mod numeric;
pub mod record;
pub mod regexp;
pub mod string;

use std::sync::Arc;

use heapsnap_core::{HeapError, HeapObject};

use crate::error::SnapshotError;
use crate::registry::ObjectCodec;

pub use collection::{ArrayCodec, ByteArrayCodec, GrowableArrayCodec};
pub use executable::{ContextCodec, ContextScopeCodec, LibraryCodec, TokenStreamCodec};
pub use metadata::{ClassCodec, TypeArgumentsCodec};
pub use numeric::{BigintCodec, DoubleCodec, MintCodec};
pub use record::RecordCodec;
pub use regexp::RegExpCodec;
pub use string::StringCodec;

/// Every codec of the standard registry
pub fn standard_codecs() -> Vec<Arc<dyn ObjectCodec>> {
    let mut codecs: Vec<Arc<dyn ObjectCodec>> = Vec::new();
    codecs.extend(metadata::codecs());
    codecs.extend(executable::codecs());
    codecs.extend(numeric::codecs());
    codecs.extend(string::codecs());
    codecs.extend(collection::codecs());
    codecs.push(Arc::new(RegExpCodec));
    codecs
}

pub(crate) fn unexpected_body(object: &HeapObject) -> SnapshotError {
    SnapshotError::Heap(HeapError::BodyMismatch {
        class_id: object.class_id(),
        body: object.body.variant_name(),
    })
}
