//! Collaborator traits consumed by snapshot passes
//!
//! A pass never talks to a concrete heap. It sees the heap through these
//! narrow contracts, bundled into the object-safe [`SnapshotHeap`]:
//!
//! - [`ObjectStore`]: read and patch objects by handle
//! - [`Allocator`]: create objects in a chosen space
//! - [`CanonicalTable`]: intern strings and canonical values
//! - [`ResidentLookup`]: find objects the target heap already holds
//! - [`GcCoordinator`]: hold off collection for the length of a pass
//!
//! [`ManagedHeap`](crate::heap::ManagedHeap) implements all of them.

use std::ops::{Deref, DerefMut};

use crate::error::{HeapError, Result};
use crate::layout::ScalarKind;
use crate::object::HeapObject;
use crate::types::{ClassId, Handle, Space};

/// Read and patch access to heap objects
pub trait ObjectStore {
    /// Object behind a handle
    fn object(&self, handle: Handle) -> Option<&HeapObject>;

    /// Mutable object behind a handle
    fn object_mut(&mut self, handle: Handle) -> Option<&mut HeapObject>;
}

/// Object allocation
pub trait Allocator {
    /// Move an object into the heap
    ///
    /// `Space::Old` is the permanent arena used when a whole heap image is
    /// being constructed; `Space::New` is the ordinary constructor path.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::OutOfMemory` when the heap refuses the allocation.
    fn allocate(&mut self, object: HeapObject, space: Space) -> Result<Handle>;
}

/// Interning of canonical values
///
/// Both methods take a fully populated candidate. They return the existing
/// canonical instance with equal content, or install the candidate (setting
/// its canonical tag) and return it unchanged.
pub trait CanonicalTable {
    /// Intern a string into the symbol table
    fn intern_string(&mut self, candidate: Handle) -> Result<Handle>;

    /// Intern a number, type or type-argument vector
    fn intern_value(&mut self, class_id: ClassId, candidate: Handle) -> Result<Handle>;
}

/// Category of an object addressable by key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidentCategory {
    /// Library keyed by URL
    Library,
}

/// Lookup of objects already resident in the target heap
pub trait ResidentLookup {
    /// Resident object registered under a key
    fn lookup_by_key(&self, category: ResidentCategory, key: &str) -> Option<Handle>;

    /// Make an object resolvable by key
    fn register_resident(&mut self, category: ResidentCategory, key: String, handle: Handle);

    /// Statically known class with a class-table index
    fn class_by_index(&self, index: u32) -> Option<Handle>;

    /// Install a class in the class table
    fn register_class(&mut self, index: u32, handle: Handle);
}

/// Class-table index of a class object
pub fn class_index<H>(heap: &H, handle: Handle) -> Result<u32>
where
    H: ObjectStore + ?Sized,
{
    let object = heap.object(handle).ok_or(HeapError::InvalidHandle(handle))?;
    let index = object
        .as_record()
        .filter(|r| r.class_id() == ClassId::Class)
        .and_then(|r| r.int("class_index"))
        .ok_or(HeapError::TypeMismatch {
            handle,
            expected: "class",
            found: object.class_id(),
        })?;
    u32::try_from(index).map_err(|_| HeapError::FieldType {
        class_id: ClassId::Class,
        field: "class_index".to_string(),
        expected: ScalarKind::Int,
    })
}

/// URL text of a library object
pub fn library_url<H>(heap: &H, handle: Handle) -> Result<String>
where
    H: ObjectStore + ?Sized,
{
    let object = heap.object(handle).ok_or(HeapError::InvalidHandle(handle))?;
    let url = object
        .as_record()
        .filter(|r| r.class_id() == ClassId::Library)
        .and_then(|r| r.get("url"))
        .and_then(|v| v.as_ref())
        .ok_or(HeapError::TypeMismatch {
            handle,
            expected: "library with url",
            found: object.class_id(),
        })?;
    let target = heap.object(url).ok_or(HeapError::InvalidHandle(url))?;
    target
        .as_string()
        .map(|s| s.units().to_string_lossy())
        .ok_or(HeapError::TypeMismatch {
            handle: url,
            expected: "string",
            found: target.class_id(),
        })
}

/// Mark a class resident and install it under its `class_index` field
pub fn install_class<H>(heap: &mut H, handle: Handle) -> Result<u32>
where
    H: ObjectStore + ResidentLookup + ?Sized,
{
    let index = class_index(heap, handle)?;
    if let Some(class) = heap.object_mut(handle) {
        class.tags.created_from_snapshot = true;
    }
    heap.register_class(index, handle);
    Ok(index)
}

/// Mark a library resident and register it under its URL
pub fn install_library<H>(heap: &mut H, handle: Handle) -> Result<String>
where
    H: ObjectStore + ResidentLookup + ?Sized,
{
    let url = library_url(heap, handle)?;
    if let Some(library) = heap.object_mut(handle) {
        library.tags.created_from_snapshot = true;
    }
    heap.register_resident(ResidentCategory::Library, url.clone(), handle);
    Ok(url)
}

/// Garbage-collector coordination
pub trait GcCoordinator {
    /// Forbid collection until the matching exit
    ///
    /// Scopes nest; collection resumes once every scope has exited.
    fn enter_no_collection_scope(&self);

    /// Leave a scope opened by `enter_no_collection_scope`
    fn exit_no_collection_scope(&self);
}

/// Everything a snapshot pass needs from a heap
pub trait SnapshotHeap:
    ObjectStore + Allocator + CanonicalTable + ResidentLookup + GcCoordinator
{
}

impl<T> SnapshotHeap for T where
    T: ObjectStore + Allocator + CanonicalTable + ResidentLookup + GcCoordinator + ?Sized
{
}

/// Shared borrow of a heap with collection held off
pub struct NoCollectionScope<'h, H: ?Sized + GcCoordinator> {
    heap: &'h H,
}

impl<'h, H: ?Sized + GcCoordinator> NoCollectionScope<'h, H> {
    /// Enter a no-collection scope on `heap`
    pub fn enter(heap: &'h H) -> Self {
        heap.enter_no_collection_scope();
        NoCollectionScope { heap }
    }
}

impl<H: ?Sized + GcCoordinator> Deref for NoCollectionScope<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.heap
    }
}

impl<H: ?Sized + GcCoordinator> Drop for NoCollectionScope<'_, H> {
    fn drop(&mut self) {
        self.heap.exit_no_collection_scope();
    }
}

/// Exclusive borrow of a heap with collection held off
pub struct NoCollectionScopeMut<'h, H: ?Sized + GcCoordinator> {
    heap: &'h mut H,
}

impl<'h, H: ?Sized + GcCoordinator> NoCollectionScopeMut<'h, H> {
    /// Enter a no-collection scope on `heap`
    pub fn enter(heap: &'h mut H) -> Self {
        heap.enter_no_collection_scope();
        NoCollectionScopeMut { heap }
    }
}

impl<H: ?Sized + GcCoordinator> Deref for NoCollectionScopeMut<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.heap
    }
}

impl<H: ?Sized + GcCoordinator> DerefMut for NoCollectionScopeMut<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.heap
    }
}

impl<H: ?Sized + GcCoordinator> Drop for NoCollectionScopeMut<'_, H> {
    fn drop(&mut self) {
        self.heap.exit_no_collection_scope();
    }
}
