//! Snapshot writer and reader for heapsnap
//!
//! This crate turns an object graph reachable from a root value into a
//! compact byte stream and back:
//! - Stream primitives: varints, zigzag, little-endian fixed width
//! - Markers and object headers
//! - Backward reference tables, one per pass
//! - Kind policy: which categories may appear in full, script and message
//!   snapshots, and how resident metadata is abbreviated
//! - Codec registry with one codec per transmissible category
//! - Writer and reader drivers, plus the envelope around the payload
//!
//! # Quick Start
//!
//! ```ignore
//! use heapsnap_core::ManagedHeap;
//! use heapsnap_snapshot::{deserialize, serialize, CodecRegistry, SnapshotConfig, SnapshotKind};
//!
//! let registry = CodecRegistry::standard();
//! let config = SnapshotConfig::default();
//! let snapshot = serialize(&source, root, SnapshotKind::Message, &registry, &config)?;
//! let copy = deserialize(&mut target, &snapshot.to_bytes(), SnapshotKind::Message, &registry, &config)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backref;
pub mod codecs;
pub mod config;
pub mod error;
pub mod header;
pub mod policy;
pub mod reader;
pub mod registry;
pub mod snapshot;
pub mod stream;
pub mod writer;

pub use backref::{ReaderRefTable, WriterRefTable};
pub use config::{ConfigError, SnapshotConfig};
pub use error::{Result, SnapshotError};
pub use header::{Marker, ObjectHeader, FALSE_ID, FIRST_OBJECT_ID, NULL_ID, TRUE_ID};
pub use policy::{permission, Permission, SnapshotKind};
pub use reader::{deserialize, deserialize_with_report, ReadReport, SnapshotReader};
pub use registry::{AllocationStrategy, CodecRegistry, ObjectCodec};
pub use snapshot::{Snapshot, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use writer::{serialize, serialize_with_report, SnapshotWriter, WriteReport};
