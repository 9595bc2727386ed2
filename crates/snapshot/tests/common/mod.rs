//! Shared helpers for the snapshot integration suites.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::sync::Once;

pub use heapsnap_core::{
    class_record, structurally_equal, ArrayObject, Bigint, ByteStorage, CanonicalTable, ClassId,
    CodeUnits, Handle, HeapObject, ManagedHeap, ObjectBody, ObjectStore, ObjectTags, Record,
    RegExpObject, ResidentCategory, ResidentLookup, Scalar, StringObject, Value,
};
pub use heapsnap_snapshot::{
    deserialize, deserialize_with_report, serialize, serialize_with_report, CodecRegistry,
    ReadReport, Snapshot, SnapshotConfig, SnapshotError, SnapshotKind, WriteReport,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Pass helpers
// ============================================================================

/// Write `root` from `source` and read it into `target`
pub fn transfer(
    source: &ManagedHeap,
    root: Value,
    target: &mut ManagedHeap,
    kind: SnapshotKind,
) -> Result<Value, SnapshotError> {
    init_tracing();
    let registry = CodecRegistry::standard();
    let config = SnapshotConfig::for_testing();
    let snapshot = serialize(source, root, kind, &registry, &config)?;
    deserialize(target, &snapshot.to_bytes(), kind, &registry, &config)
}

/// Copy `root` into a fresh heap, panicking on failure
pub fn roundtrip(source: &ManagedHeap, root: Value, kind: SnapshotKind) -> (ManagedHeap, Value) {
    let mut target = ManagedHeap::new();
    let copy = transfer(source, root, &mut target, kind).expect("roundtrip failed");
    (target, copy)
}

/// Envelope bytes of `root`
pub fn snapshot_bytes(heap: &ManagedHeap, root: Value, kind: SnapshotKind) -> Vec<u8> {
    init_tracing();
    serialize(
        heap,
        root,
        kind,
        &CodecRegistry::standard(),
        &SnapshotConfig::for_testing(),
    )
    .expect("serialize failed")
    .to_bytes()
}

/// Read envelope bytes into `target` with the standard registry
pub fn read_bytes(
    target: &mut ManagedHeap,
    bytes: &[u8],
    kind: SnapshotKind,
) -> Result<Value, SnapshotError> {
    init_tracing();
    deserialize(
        target,
        bytes,
        kind,
        &CodecRegistry::standard(),
        &SnapshotConfig::for_testing(),
    )
}

/// Assert the copy is isomorphic to the original
pub fn assert_same_graph(a: &ManagedHeap, a_root: Value, b: &ManagedHeap, b_root: Value) {
    assert!(
        structurally_equal(a, a_root, b, b_root),
        "graphs differ: {a_root:?} vs {b_root:?}"
    );
}

// ============================================================================
// Fixtures
// ============================================================================

/// Object with explicit tags
pub fn alloc_tagged(heap: &mut ManagedHeap, tags: ObjectTags, body: ObjectBody) -> Handle {
    let object = HeapObject::from_body(body).expect("body");
    heap.alloc_with(object.class_id(), tags, object.body)
        .expect("alloc")
}

/// Canonical (but not interned) string
pub fn canonical_string(heap: &mut ManagedHeap, text: &str) -> Handle {
    alloc_tagged(
        heap,
        ObjectTags::canonical(),
        ObjectBody::String(StringObject::internal(CodeUnits::from_text(text))),
    )
}

/// Class with a class-table index
pub fn class(heap: &mut ManagedHeap, index: u32, name: &str) -> Handle {
    let name = heap.symbol(name).expect("symbol");
    let record = class_record(index, name.into()).expect("class record");
    heap.alloc_record(record).expect("alloc class")
}

/// Library record with a URL string
pub fn library(heap: &mut ManagedHeap, url: &str) -> Handle {
    let url = heap.symbol(url).expect("symbol");
    let record = Record::new(ClassId::Library)
        .expect("layout")
        .with("url", url)
        .expect("url");
    heap.alloc_record(record).expect("alloc library")
}

/// Function record owned by `owner`
pub fn function(heap: &mut ManagedHeap, name: &str, owner: Handle) -> Handle {
    let name = heap.symbol(name).expect("symbol");
    let record = Record::new(ClassId::Function)
        .expect("layout")
        .with("name", name)
        .expect("name")
        .with("owner", owner)
        .expect("owner")
        .with_scalar("num_fixed_parameters", Scalar::Int(2))
        .expect("scalar")
        .with_scalar("is_optimizable", Scalar::Bool(true))
        .expect("flag");
    heap.alloc_record(record).expect("alloc function")
}

/// Mark an object as already resident
pub fn make_resident(heap: &mut ManagedHeap, handle: Handle) {
    let mut tags = heap.get(handle).expect("object").tags;
    tags.created_from_snapshot = true;
    heap.set_tags(handle, tags).expect("tags");
}
