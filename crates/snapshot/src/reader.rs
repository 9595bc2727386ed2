//! Snapshot reader
//!
//! Rebuilds a graph from a payload, one value at a time, in the order the
//! writer emitted them. Every `Inlined` object is registered under its id
//! before any of its pointer fields is read, so back-references from inside
//! a cycle resolve to the object still being filled in.
//!
//! ## Canonical values
//!
//! In script and message snapshots a freshly read object tagged canonical
//! is interned once its payload is complete. If an equal canonical instance
//! already exists, the id is repointed at it and later back-references
//! resolve to the existing instance.
//!
//! ## Residents
//!
//! Libraries and classes read in full are collected during the pass and
//! installed into the target heap only after the whole payload decoded.
//! A failed pass leaves the lookup tables untouched. A pass never replaces
//! a resident: a class index or library URL already bound in the target
//! fails the pass with `ResidentConflict`.

use heapsnap_core::{
    class_index, install_class, install_library, library_url, Handle, HeapError, HeapObject,
    NoCollectionScopeMut, ObjectBody, ResidentCategory, SnapshotHeap, Value,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::backref::ReaderRefTable;
use crate::config::SnapshotConfig;
use crate::error::{Result, SnapshotError};
use crate::header::{
    read_marker, read_object_header, Marker, ObjectHeader, FALSE_ID, NULL_ID, TRUE_ID,
};
use crate::policy::{self, SnapshotKind};
use crate::registry::{AllocationStrategy, CodecRegistry};
use crate::snapshot::Snapshot;
use crate::stream::StreamReader;

/// Counters collected by a read pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadReport {
    /// Objects read in full
    pub objects_read: usize,
    /// Fresh objects replaced by an existing canonical instance
    pub canonicalized: usize,
    /// Regular expressions whose matching program must be rebuilt
    pub regexes_awaiting_recompilation: usize,
}

/// State of one read pass
///
/// Codecs receive it in [`ObjectCodec::read_from`](crate::ObjectCodec::read_from).
pub struct SnapshotReader<'a> {
    heap: &'a mut dyn SnapshotHeap,
    registry: &'a CodecRegistry,
    config: &'a SnapshotConfig,
    kind: SnapshotKind,
    stream: StreamReader<'a>,
    refs: ReaderRefTable,
    depth: usize,
    libraries: Vec<Handle>,
    classes: Vec<Handle>,
    report: ReadReport,
}

impl<'a> SnapshotReader<'a> {
    /// Create a reader over a bare payload
    pub fn new(
        heap: &'a mut dyn SnapshotHeap,
        payload: &'a [u8],
        kind: SnapshotKind,
        registry: &'a CodecRegistry,
        config: &'a SnapshotConfig,
    ) -> Self {
        SnapshotReader {
            heap,
            registry,
            config,
            kind,
            stream: StreamReader::new(payload),
            refs: ReaderRefTable::new(),
            depth: 0,
            libraries: Vec::new(),
            classes: Vec::new(),
            report: ReadReport::default(),
        }
    }

    /// Kind of this pass
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    /// Configuration of this pass
    pub fn config(&self) -> &SnapshotConfig {
        self.config
    }

    /// Input stream for scalar payload fields
    pub fn stream(&mut self) -> &mut StreamReader<'a> {
        &mut self.stream
    }

    /// Read a length prefix for `len` items of at least `item_bytes` each
    ///
    /// Rejects lengths above the configured bound and lengths the rest of
    /// the payload cannot possibly hold, before anything is allocated.
    pub fn read_count(&mut self, item_bytes: usize) -> Result<usize> {
        let offset = self.stream.position();
        let len = self.stream.read_len(self.config.max_payload_len)?;
        let needed = len.checked_mul(item_bytes).ok_or_else(|| {
            SnapshotError::corrupt(offset, format!("length {len} overflows"))
        })?;
        if needed > self.stream.remaining() {
            return Err(SnapshotError::UnexpectedEof {
                offset: self.stream.position(),
                needed,
            });
        }
        Ok(len)
    }

    /// Read a length prefix for single-byte-or-larger items
    pub fn read_len(&mut self) -> Result<usize> {
        self.read_count(1)
    }

    /// Read one slot value
    pub fn read_value(&mut self) -> Result<Value> {
        let offset = self.stream.position();
        match read_marker(&mut self.stream)? {
            Marker::Smi(v) => Ok(Value::Smi(v)),
            Marker::ObjectId(NULL_ID) => Ok(Value::Null),
            Marker::ObjectId(TRUE_ID) => Ok(Value::Bool(true)),
            Marker::ObjectId(FALSE_ID) => Ok(Value::Bool(false)),
            Marker::ObjectId(id) => self.refs.lookup(id).map(Value::Ref),
            Marker::ClassId(index) => self.read_class_reference(offset, index),
            Marker::Inlined(id) => self.read_object(id).map(Value::Ref),
        }
    }

    /// Read `len` slot values
    pub fn read_values(&mut self, len: usize) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(self.read_value()?);
        }
        Ok(values)
    }

    /// Allocate an object read from the stream
    ///
    /// Full snapshots build a permanent image: objects land in old space and
    /// carry the created-from-snapshot tag.
    pub fn allocate(&mut self, header: ObjectHeader, body: ObjectBody) -> Result<Handle> {
        let mut tags = header.tags;
        if self.kind == SnapshotKind::Full {
            tags.created_from_snapshot = true;
        }
        let object = HeapObject::new(header.class_id, tags, body)?;
        Ok(self.heap.allocate(object, self.kind.space())?)
    }

    /// Register the handle of object `id`
    pub fn register(&mut self, id: u32, handle: Handle) -> Result<()> {
        self.refs.record(id, handle)
    }

    /// Object behind a handle
    pub fn object(&self, handle: Handle) -> Result<&HeapObject> {
        self.heap
            .object(handle)
            .ok_or(SnapshotError::Heap(HeapError::InvalidHandle(handle)))
    }

    /// Update an allocated object's body in place
    pub fn patch(&mut self, handle: Handle, f: impl FnOnce(&mut ObjectBody)) -> Result<()> {
        let object = self
            .heap
            .object_mut(handle)
            .ok_or(SnapshotError::Heap(HeapError::InvalidHandle(handle)))?;
        f(&mut object.body);
        Ok(())
    }

    /// Text of a string value
    pub fn string_text(&self, value: Value) -> Result<String> {
        let offset = self.stream.position();
        value
            .as_ref()
            .and_then(|h| self.heap.object(h))
            .and_then(|o| o.as_string())
            .map(|s| s.units().to_string_lossy())
            .ok_or_else(|| SnapshotError::corrupt(offset, "expected a string"))
    }

    /// Resident object registered in the target heap under a key
    pub fn resident(&self, category: ResidentCategory, key: &str) -> Result<Handle> {
        self.heap
            .lookup_by_key(category, key)
            .ok_or_else(|| SnapshotError::ResidentNotFound {
                what: match category {
                    ResidentCategory::Library => "library",
                },
                key: key.to_string(),
            })
    }

    /// Install a library under its URL once the pass succeeds
    pub fn defer_library(&mut self, handle: Handle) {
        self.libraries.push(handle);
    }

    /// Install a class in the class table once the pass succeeds
    pub fn defer_class(&mut self, handle: Handle) {
        self.classes.push(handle);
    }

    /// Count a regular expression that arrived without its program
    pub fn note_regex_recompilation(&mut self) {
        self.report.regexes_awaiting_recompilation += 1;
    }

    fn read_class_reference(&mut self, offset: usize, index: u32) -> Result<Value> {
        if self.kind == SnapshotKind::Full {
            return Err(SnapshotError::corrupt(
                offset,
                "class-id reference in a full snapshot",
            ));
        }
        self.heap
            .class_by_index(index)
            .map(Value::Ref)
            .ok_or_else(|| SnapshotError::ResidentNotFound {
                what: "class",
                key: index.to_string(),
            })
    }

    fn read_object(&mut self, id: u32) -> Result<Handle> {
        if id > self.config.max_object_id {
            return Err(SnapshotError::IdSpaceExhausted {
                limit: self.config.max_object_id,
            });
        }
        self.refs.reserve(id)?;

        let header = read_object_header(&mut self.stream)?;
        policy::check_inline(header.class_id, self.kind)?;
        policy::check_transmissible(header.class_id, header.tags, self.kind)?;
        let registry = self.registry;
        let codec = registry.lookup(header.class_id)?;
        trace!(id, class = %header.class_id, "Reading object");

        if self.depth >= self.config.max_depth {
            return Err(SnapshotError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        let handle = codec.read_from(self, id, header)?;
        self.depth -= 1;

        if !self.refs.is_recorded(id) {
            self.refs.record(id, handle)?;
        }
        let handle = self.canonicalize(id, header, codec.strategy(), handle)?;
        self.report.objects_read += 1;
        Ok(handle)
    }

    fn canonicalize(
        &mut self,
        id: u32,
        header: ObjectHeader,
        strategy: AllocationStrategy,
        handle: Handle,
    ) -> Result<Handle> {
        if !header.tags.canonical || !self.kind.interns() {
            return Ok(handle);
        }
        let canonical = match strategy {
            AllocationStrategy::Plain => return Ok(handle),
            AllocationStrategy::Symbol => self.heap.intern_string(handle)?,
            AllocationStrategy::CanonicalValue => {
                self.heap.intern_value(header.class_id, handle)?
            }
        };
        if canonical != handle {
            self.refs.repoint(id, canonical)?;
            self.report.canonicalized += 1;
        }
        Ok(canonical)
    }

    fn into_parts(self) -> (Vec<Handle>, Vec<Handle>, ReadReport) {
        (self.libraries, self.classes, self.report)
    }
}

/// Deserialize a snapshot into `heap` and return its root
///
/// `bytes` is a complete envelope as produced by [`Snapshot::to_bytes`].
///
/// # Errors
///
/// Fails on any malformed or policy-violating input, on any limit in
/// `config`, and when the envelope's kind differs from `kind`. On failure
/// objects allocated so far stay unreachable and no resident is installed.
pub fn deserialize(
    heap: &mut dyn SnapshotHeap,
    bytes: &[u8],
    kind: SnapshotKind,
    registry: &CodecRegistry,
    config: &SnapshotConfig,
) -> Result<Value> {
    deserialize_with_report(heap, bytes, kind, registry, config).map(|(root, _)| root)
}

/// Deserialize and return the pass counters
pub fn deserialize_with_report(
    heap: &mut dyn SnapshotHeap,
    bytes: &[u8],
    kind: SnapshotKind,
    registry: &CodecRegistry,
    config: &SnapshotConfig,
) -> Result<(Value, ReadReport)> {
    config.validate()?;
    let (found, payload) = Snapshot::parse(bytes)?;
    if found != kind {
        return Err(SnapshotError::KindMismatch {
            expected: kind,
            found,
        });
    }

    let mut scope = NoCollectionScopeMut::enter(heap);
    debug!(kind = %kind, bytes = payload.len(), "Snapshot read started");

    let mut reader = SnapshotReader::new(&mut *scope, payload, kind, registry, config);
    let root = reader.read_value()?;
    let trailing = reader.stream.remaining();
    if trailing > 0 {
        return Err(SnapshotError::TrailingBytes(trailing));
    }
    let (libraries, classes, report) = reader.into_parts();

    check_residents(&*scope, &libraries, &classes)?;
    for library in libraries {
        let url = install_library(&mut *scope, library)?;
        trace!(url = %url, "Installed library");
    }
    for class in classes {
        let index = install_class(&mut *scope, class)?;
        trace!(index, "Installed class");
    }

    if report.regexes_awaiting_recompilation > 0 {
        warn!(
            count = report.regexes_awaiting_recompilation,
            "Regular expressions read without a matching program"
        );
    }
    debug!(
        kind = %kind,
        objects = report.objects_read,
        canonicalized = report.canonicalized,
        "Snapshot read finished"
    );
    Ok((root, report))
}

/// Fail unless every deferred library and class can be installed
///
/// A key already bound to another object in the target, or claimed twice in
/// one pass, is a conflict. Nothing is installed until all keys check out.
fn check_residents(
    heap: &dyn SnapshotHeap,
    libraries: &[Handle],
    classes: &[Handle],
) -> Result<()> {
    let mut urls = FxHashSet::default();
    for &library in libraries {
        let url = library_url(heap, library)?;
        let taken = heap
            .lookup_by_key(ResidentCategory::Library, &url)
            .is_some_and(|resident| resident != library);
        if taken || !urls.insert(url.clone()) {
            return Err(SnapshotError::ResidentConflict {
                what: "library",
                key: url,
            });
        }
    }

    let mut indices = FxHashSet::default();
    for &class in classes {
        let index = class_index(heap, class)?;
        let taken = heap
            .class_by_index(index)
            .is_some_and(|resident| resident != class);
        if taken || !indices.insert(index) {
            return Err(SnapshotError::ResidentConflict {
                what: "class",
                key: index.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{write_marker, write_object_header};
    use crate::stream::StreamWriter;
    use heapsnap_core::{CanonicalTable, ClassId, ManagedHeap, ObjectTags};

    fn read(
        heap: &mut ManagedHeap,
        payload: Vec<u8>,
        kind: SnapshotKind,
    ) -> Result<(Value, ReadReport)> {
        let bytes = Snapshot::new(kind, payload).to_bytes();
        deserialize_with_report(
            heap,
            &bytes,
            kind,
            &CodecRegistry::standard(),
            &SnapshotConfig::for_testing(),
        )
    }

    fn mint_payload(id: u32, value: i64, tags: ObjectTags) -> Vec<u8> {
        let mut w = StreamWriter::new();
        write_marker(&mut w, Marker::Inlined(id));
        write_object_header(
            &mut w,
            ObjectHeader {
                class_id: ClassId::Mint,
                tags,
            },
        );
        w.write_i64(value);
        w.into_inner()
    }

    #[test]
    fn test_predefined_ids() {
        let mut heap = ManagedHeap::new();
        let (root, _) = read(&mut heap, vec![2, TRUE_ID as u8], SnapshotKind::Message).unwrap();
        assert_eq!(root, Value::Bool(true));
        assert!(heap.is_empty());
    }

    #[test]
    fn test_out_of_sequence_id() {
        let mut heap = ManagedHeap::new();
        let payload = mint_payload(4, 1, ObjectTags::default());
        assert_eq!(
            read(&mut heap, payload, SnapshotKind::Message).unwrap_err(),
            SnapshotError::IdMismatch {
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let mut heap = ManagedHeap::new();
        let mut payload = mint_payload(3, 1, ObjectTags::default());
        payload.push(0);
        assert_eq!(
            read(&mut heap, payload, SnapshotKind::Message).unwrap_err(),
            SnapshotError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_full_kind_marks_objects_resident() {
        let mut heap = ManagedHeap::new();
        let payload = mint_payload(3, 9, ObjectTags::default());
        let (root, _) = read(&mut heap, payload, SnapshotKind::Full).unwrap();
        let handle = root.as_ref().unwrap();
        assert!(heap.get(handle).unwrap().tags.created_from_snapshot);
        assert_eq!(heap.space_of(handle), Some(heapsnap_core::Space::Old));
    }

    #[test]
    fn test_canonical_mint_interned_in_message() {
        let mut heap = ManagedHeap::new();
        let existing = heap.alloc_mint(9).unwrap();
        let existing = heap.intern_value(ClassId::Mint, existing).unwrap();

        let payload = mint_payload(3, 9, ObjectTags::canonical());
        let (root, report) = read(&mut heap, payload, SnapshotKind::Message).unwrap();
        assert_eq!(root, Value::Ref(existing));
        assert_eq!(report.canonicalized, 1);
    }

    #[test]
    fn test_class_reference_in_full_kind_is_corrupt() {
        let mut heap = ManagedHeap::new();
        let err = read(&mut heap, vec![3, 5], SnapshotKind::Full).unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut heap = ManagedHeap::new();
        let bytes = Snapshot::new(SnapshotKind::Script, vec![2, 0]).to_bytes();
        let err = deserialize(
            &mut heap,
            &bytes,
            SnapshotKind::Message,
            &CodecRegistry::standard(),
            &SnapshotConfig::for_testing(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SnapshotError::KindMismatch {
                expected: SnapshotKind::Message,
                found: SnapshotKind::Script
            }
        );
    }

    #[test]
    fn test_gc_scope_released_after_failure() {
        let mut heap = ManagedHeap::new();
        assert!(read(&mut heap, vec![9], SnapshotKind::Message).is_err());
        assert_eq!(heap.gate().depth(), 0);
    }
}
