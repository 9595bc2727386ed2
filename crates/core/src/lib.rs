//! Core types and traits for heapsnap
//!
//! This crate defines the heap object model that snapshot passes operate on:
//! - Handle / Value: object identity and slot contents
//! - ClassId: closed set of object categories with stable wire numbers
//! - ObjectTags: named header flags with explicit pack/unpack
//! - Layout / Record: declarative field tables for fixed-shape categories
//! - HeapObject / ObjectBody: per-category payloads
//! - Traits: collaborator contracts (store, allocator, canonical table,
//!   resident lookup, GC coordination)
//! - ManagedHeap: reference arena heap implementing every contract
//! - CollectionGate: shared no-collection gate for a concurrent collector
//! - structurally_equal: graph isomorphism check

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bigint;
pub mod error;
pub mod gate;
pub mod heap;
pub mod layout;
pub mod object;
pub mod structural;
pub mod tags;
pub mod traits;
pub mod types;

pub use bigint::{Bigint, ParseHexError};
pub use error::{HeapError, Result};
pub use gate::{CollectionGate, CollectionPermit};
pub use heap::{class_record, ManagedHeap};
pub use layout::{FieldDescriptor, FieldKind, Layout, Record, Scalar, ScalarKind};
pub use object::{
    ArrayObject, ByteStorage, CanonicalKey, CharWidth, CodeUnits, HeapObject, ObjectBody,
    RegExpObject, StringObject, StringStorage, SLOTS_PER_VARIABLE,
};
pub use structural::structurally_equal;
pub use tags::{InvalidTags, ObjectTags};
pub use traits::{
    class_index, install_class, install_library, library_url, Allocator, CanonicalTable,
    GcCoordinator, NoCollectionScope, NoCollectionScopeMut, ObjectStore, ResidentCategory,
    ResidentLookup, SnapshotHeap,
};
pub use types::{ClassId, Handle, Space, Value};
