//! heapsnap - Snapshot serialization for managed-heap object graphs
//!
//! heapsnap turns the object graph reachable from a root value into a
//! self-describing byte stream and rebuilds an equivalent graph in another
//! heap. Three snapshot kinds cover the common transfer shapes: full heap
//! images, incremental script snapshots, and isolate-to-isolate messages.
//!
//! # Quick Start
//!
//! ```ignore
//! use heapsnap::{deserialize, serialize, CodecRegistry, ManagedHeap, SnapshotConfig, SnapshotKind};
//!
//! let mut source = ManagedHeap::new();
//! let text = source.alloc_string("hello")?;
//! let root = source.alloc_array(vec![text.into(), text.into()])?;
//!
//! let registry = CodecRegistry::standard();
//! let config = SnapshotConfig::default();
//! let snapshot = serialize(&source, root.into(), SnapshotKind::Message, &registry, &config)?;
//!
//! let mut target = ManagedHeap::new();
//! let copy = deserialize(&mut target, &snapshot.to_bytes(), SnapshotKind::Message, &registry, &config)?;
//! ```
//!
//! # Architecture
//!
//! The object model and the heap contracts live in `heapsnap-core`; the
//! stream format, kind policy, codecs and pass drivers live in
//! `heapsnap-snapshot`. Both are re-exported here.

pub use heapsnap_core::*;
pub use heapsnap_snapshot::*;
