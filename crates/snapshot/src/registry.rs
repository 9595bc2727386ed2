//! Codec registry
//!
//! Maps class ids to the codec that reads and writes them. Built once,
//! typically with [`CodecRegistry::standard`], and passed by reference into
//! every pass.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = CodecRegistry::standard();
//! let snapshot = serialize(&heap, root, SnapshotKind::Message, &registry, &config)?;
//! ```

use std::fmt;
use std::sync::Arc;

use heapsnap_core::{ClassId, Handle, HeapObject};
use rustc_hash::FxHashMap;

use crate::codecs;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::writer::SnapshotWriter;

/// What happens to a freshly read object after its payload is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Kept as allocated; identity comes from the id space alone
    Plain,
    /// Canonical instances are interned into the symbol table
    Symbol,
    /// Canonical instances are interned into the canonical value table
    CanonicalValue,
}

/// Encode/decode pair for one or more categories
pub trait ObjectCodec: Send + Sync {
    /// Categories handled by this codec
    fn class_ids(&self) -> &[ClassId];

    /// Post-read treatment of canonical instances
    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::Plain
    }

    /// Write the payload of `object`
    ///
    /// The marker and header have already been written.
    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()>;

    /// Read the payload of object `id` and return its handle
    ///
    /// Implementations must call [`SnapshotReader::register`] for `id`
    /// before reading any pointer-valued field.
    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle>;
}

/// Registry of codecs by class id
pub struct CodecRegistry {
    codecs: FxHashMap<ClassId, Arc<dyn ObjectCodec>>,
}

impl CodecRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        CodecRegistry {
            codecs: FxHashMap::default(),
        }
    }

    /// Registry with a codec for every transmissible category
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for codec in codecs::standard_codecs() {
            registry.register(codec);
        }
        registry
    }

    /// Register a codec for every class id it declares
    pub fn register(&mut self, codec: Arc<dyn ObjectCodec>) {
        for &class_id in codec.class_ids() {
            self.codecs.insert(class_id, Arc::clone(&codec));
        }
    }

    /// Remove the codec for a class id
    pub fn unregister(&mut self, class_id: ClassId) -> Option<Arc<dyn ObjectCodec>> {
        self.codecs.remove(&class_id)
    }

    /// Codec for a class id
    pub fn get(&self, class_id: ClassId) -> Option<&dyn ObjectCodec> {
        self.codecs.get(&class_id).map(|c| c.as_ref())
    }

    /// Codec for a class id, or `NoCodec`
    pub fn lookup(&self, class_id: ClassId) -> Result<&dyn ObjectCodec> {
        self.get(class_id).ok_or(SnapshotError::NoCodec(class_id))
    }

    /// Post-read strategy for a class id
    pub fn strategy(&self, class_id: ClassId) -> Option<AllocationStrategy> {
        self.get(class_id).map(|c| c.strategy())
    }

    /// Check if a class id has a codec
    pub fn is_registered(&self, class_id: ClassId) -> bool {
        self.codecs.contains_key(&class_id)
    }

    /// Registered class ids in numeric order
    pub fn class_ids(&self) -> Vec<ClassId> {
        let mut ids: Vec<ClassId> = self.codecs.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Get the number of registered class ids
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codec_count", &self.codecs.len())
            .field("class_ids", &self.class_ids())
            .finish()
    }
}
