//! Reference in-memory heap
//!
//! `ManagedHeap` is an arena of [`HeapObject`]s plus the tables a snapshot
//! pass consults: the symbol table, the canonical value table, the resident
//! tables and the class table. It implements every collaborator trait in
//! [`crate::traits`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bigint::Bigint;
use crate::error::{HeapError, Result};
use crate::gate::CollectionGate;
use crate::layout::{Record, Scalar};
use crate::object::{ArrayObject, CanonicalKey, CodeUnits, HeapObject, ObjectBody, StringObject};
use crate::tags::ObjectTags;
use crate::traits::{
    Allocator, CanonicalTable, GcCoordinator, ObjectStore, ResidentCategory, ResidentLookup,
};
use crate::types::{ClassId, Handle, Space, Value};

struct Slot {
    object: HeapObject,
    space: Space,
}

/// Arena-backed heap
pub struct ManagedHeap {
    objects: Vec<Slot>,
    symbols: FxHashMap<CanonicalKey, Handle>,
    canonical: FxHashMap<CanonicalKey, Handle>,
    residents: FxHashMap<(ResidentCategory, String), Handle>,
    classes: FxHashMap<u32, Handle>,
    gate: Arc<CollectionGate>,
    object_limit: Option<usize>,
}

impl ManagedHeap {
    /// Create an empty heap with its own collection gate
    pub fn new() -> Self {
        Self::with_gate(Arc::new(CollectionGate::new()))
    }

    /// Create an empty heap sharing an existing gate
    pub fn with_gate(gate: Arc<CollectionGate>) -> Self {
        ManagedHeap {
            objects: Vec::new(),
            symbols: FxHashMap::default(),
            canonical: FxHashMap::default(),
            residents: FxHashMap::default(),
            classes: FxHashMap::default(),
            gate,
            object_limit: None,
        }
    }

    /// Refuse allocations beyond `limit` objects
    pub fn with_object_limit(mut self, limit: usize) -> Self {
        self.object_limit = Some(limit);
        self
    }

    /// Collection gate of this heap
    pub fn gate(&self) -> &Arc<CollectionGate> {
        &self.gate
    }

    /// Number of allocated objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when nothing has been allocated
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object behind a handle, or `InvalidHandle`
    pub fn get(&self, handle: Handle) -> Result<&HeapObject> {
        self.object(handle).ok_or(HeapError::InvalidHandle(handle))
    }

    /// Space an object was allocated in
    pub fn space_of(&self, handle: Handle) -> Option<Space> {
        self.objects.get(handle.index() as usize).map(|s| s.space)
    }

    /// Allocate a body with default tags in new space
    pub fn alloc(&mut self, body: ObjectBody) -> Result<Handle> {
        self.allocate(HeapObject::from_body(body)?, Space::New)
    }

    /// Allocate with explicit class and tags in new space
    pub fn alloc_with(
        &mut self,
        class_id: ClassId,
        tags: ObjectTags,
        body: ObjectBody,
    ) -> Result<Handle> {
        self.allocate(HeapObject::new(class_id, tags, body)?, Space::New)
    }

    /// Allocate a fresh, non-canonical string
    pub fn alloc_string(&mut self, text: &str) -> Result<Handle> {
        self.alloc(ObjectBody::String(StringObject::internal(CodeUnits::from_text(text))))
    }

    /// Allocate or find the canonical string for `text`
    pub fn symbol(&mut self, text: &str) -> Result<Handle> {
        let candidate = self.alloc_string(text)?;
        self.intern_string(candidate)
    }

    /// Allocate a 64-bit integer
    pub fn alloc_mint(&mut self, value: i64) -> Result<Handle> {
        self.alloc(ObjectBody::Mint(value))
    }

    /// Allocate a double
    pub fn alloc_double(&mut self, value: f64) -> Result<Handle> {
        self.alloc(ObjectBody::Double(value))
    }

    /// Allocate an arbitrary-precision integer
    pub fn alloc_bigint(&mut self, value: Bigint) -> Result<Handle> {
        self.alloc(ObjectBody::Bigint(value))
    }

    /// Allocate a fixed array without type arguments
    pub fn alloc_array(&mut self, elements: Vec<Value>) -> Result<Handle> {
        self.alloc(ObjectBody::Array(ArrayObject {
            type_arguments: Value::Null,
            elements,
        }))
    }

    /// Allocate a fixed-shape record
    pub fn alloc_record(&mut self, record: Record) -> Result<Handle> {
        self.alloc(ObjectBody::Record(record))
    }

    /// Replace an object's tags
    pub fn set_tags(&mut self, handle: Handle, tags: ObjectTags) -> Result<()> {
        self.object_mut(handle)
            .ok_or(HeapError::InvalidHandle(handle))?
            .tags = tags;
        Ok(())
    }

    /// Text of a string object
    pub fn string_text(&self, handle: Handle) -> Result<String> {
        let object = self.get(handle)?;
        object
            .as_string()
            .map(|s| s.units().to_string_lossy())
            .ok_or(HeapError::TypeMismatch {
                handle,
                expected: "string",
                found: object.class_id(),
            })
    }

    fn intern(
        &mut self,
        symbols: bool,
        candidate: Handle,
        key: CanonicalKey,
    ) -> Result<Handle> {
        let table = if symbols {
            &mut self.symbols
        } else {
            &mut self.canonical
        };
        if let Some(&existing) = table.get(&key) {
            return Ok(existing);
        }
        table.insert(key, candidate);
        let object = self
            .object_mut(candidate)
            .ok_or(HeapError::InvalidHandle(candidate))?;
        object.tags.canonical = true;
        if let ObjectBody::String(s) = &mut object.body {
            s.ensure_hash();
        }
        Ok(candidate)
    }
}

impl Default for ManagedHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedHeap")
            .field("objects", &self.objects.len())
            .field("symbols", &self.symbols.len())
            .field("canonical", &self.canonical.len())
            .field("residents", &self.residents.len())
            .field("classes", &self.classes.len())
            .field("object_limit", &self.object_limit)
            .finish()
    }
}

impl ObjectStore for ManagedHeap {
    fn object(&self, handle: Handle) -> Option<&HeapObject> {
        self.objects.get(handle.index() as usize).map(|s| &s.object)
    }

    fn object_mut(&mut self, handle: Handle) -> Option<&mut HeapObject> {
        self.objects
            .get_mut(handle.index() as usize)
            .map(|s| &mut s.object)
    }
}

impl Allocator for ManagedHeap {
    fn allocate(&mut self, object: HeapObject, space: Space) -> Result<Handle> {
        let limit = self.object_limit.unwrap_or(u32::MAX as usize);
        if self.objects.len() >= limit {
            return Err(HeapError::OutOfMemory { limit });
        }
        let handle = Handle::from_index(self.objects.len() as u32);
        self.objects.push(Slot { object, space });
        Ok(handle)
    }
}

impl CanonicalTable for ManagedHeap {
    fn intern_string(&mut self, candidate: Handle) -> Result<Handle> {
        let object = self.get(candidate)?;
        if object.as_string().is_none() {
            return Err(HeapError::TypeMismatch {
                handle: candidate,
                expected: "string",
                found: object.class_id(),
            });
        }
        let key = object.canonical_key()?;
        self.intern(true, candidate, key)
    }

    fn intern_value(&mut self, class_id: ClassId, candidate: Handle) -> Result<Handle> {
        let object = self.get(candidate)?;
        if object.class_id() != class_id {
            return Err(HeapError::TypeMismatch {
                handle: candidate,
                expected: class_id.name(),
                found: object.class_id(),
            });
        }
        if object.as_string().is_some() {
            return Err(HeapError::NotCanonicalizable(class_id));
        }
        let key = object.canonical_key()?;
        self.intern(false, candidate, key)
    }
}

impl ResidentLookup for ManagedHeap {
    fn lookup_by_key(&self, category: ResidentCategory, key: &str) -> Option<Handle> {
        self.residents.get(&(category, key.to_string())).copied()
    }

    fn register_resident(&mut self, category: ResidentCategory, key: String, handle: Handle) {
        self.residents.insert((category, key), handle);
    }

    fn class_by_index(&self, index: u32) -> Option<Handle> {
        self.classes.get(&index).copied()
    }

    fn register_class(&mut self, index: u32, handle: Handle) {
        self.classes.insert(index, handle);
    }
}

impl GcCoordinator for ManagedHeap {
    fn enter_no_collection_scope(&self) {
        self.gate.enter();
    }

    fn exit_no_collection_scope(&self) {
        self.gate.exit();
    }
}

/// Build a class record with a class-table index and name
pub fn class_record(index: u32, name: Value) -> Result<Record> {
    Record::new(ClassId::Class)
        .ok_or(HeapError::BodyMismatch {
            class_id: ClassId::Class,
            body: "record",
        })?
        .with_scalar("class_index", Scalar::Int(index as i64))?
        .with("name", name)
}
