//! Canonicalization tests
//!
//! Script and message reads intern canonical values; full reads trust the
//! canonical flag as written.

mod common;

use common::*;

fn read_with_report(target: &mut ManagedHeap, bytes: &[u8], kind: SnapshotKind) -> (Value, ReadReport) {
    deserialize_with_report(
        target,
        bytes,
        kind,
        &CodecRegistry::standard(),
        &SnapshotConfig::for_testing(),
    )
    .unwrap()
}

fn elements(heap: &ManagedHeap, array: Value) -> Vec<Value> {
    match &heap.get(array.as_ref().unwrap()).unwrap().body {
        ObjectBody::Array(a) => a.elements.clone(),
        other => panic!("not an array: {other:?}"),
    }
}

// ============================================================================
// Interning on read
// ============================================================================

/// Two equal canonical bigints written as distinct objects become one
#[test]
fn test_equal_canonical_bigints_merge_in_message() {
    let mut heap = ManagedHeap::new();
    let value = Bigint::from_i128(1 << 100);
    let a = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Bigint(value.clone()));
    let b = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Bigint(value));
    let root = heap.alloc_array(vec![a.into(), b.into()]).unwrap();

    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Message);
    let mut target = ManagedHeap::new();
    let (copy, report) = read_with_report(&mut target, &bytes, SnapshotKind::Message);

    let els = elements(&target, copy);
    assert_eq!(els[0], els[1]);
    assert_eq!(report.canonicalized, 1);
    assert!(target.get(els[0].as_ref().unwrap()).unwrap().tags.canonical);
}

/// Canonical strings resolve to the target's existing symbol
#[test]
fn test_canonical_string_resolves_to_existing_symbol() {
    let mut heap = ManagedHeap::new();
    let a = canonical_string(&mut heap, "shared-name");
    let root = heap.alloc_array(vec![a.into(), a.into()]).unwrap();
    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Script);

    let mut target = ManagedHeap::new();
    let existing = target.symbol("shared-name").unwrap();
    let (copy, report) = read_with_report(&mut target, &bytes, SnapshotKind::Script);

    let els = elements(&target, copy);
    assert_eq!(els[0], Value::Ref(existing));
    assert_eq!(els[1], Value::Ref(existing), "back-reference follows the repointed id");
    assert_eq!(report.canonicalized, 1);
}

/// Canonical types are interned by content
#[test]
fn test_canonical_types_merge() {
    let mut heap = ManagedHeap::new();
    let record = Record::new(ClassId::Type)
        .unwrap()
        .with_scalar("type_state", Scalar::Byte(2))
        .unwrap();
    let a = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Record(record.clone()));
    let b = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Record(record));
    let root = heap.alloc_array(vec![a.into(), b.into()]).unwrap();

    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Message);
    let mut target = ManagedHeap::new();
    let (copy, _) = read_with_report(&mut target, &bytes, SnapshotKind::Message);
    let els = elements(&target, copy);
    assert_eq!(els[0], els[1]);
}

/// Non-canonical values are never merged
#[test]
fn test_plain_values_not_interned() {
    let mut heap = ManagedHeap::new();
    let a = heap.alloc_mint(11).unwrap();
    let root = heap.alloc_array(vec![a.into()]).unwrap();
    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Message);

    let mut target = ManagedHeap::new();
    let existing = target.alloc_mint(11).unwrap();
    let existing = target.intern_value(ClassId::Mint, existing).unwrap();
    let (copy, report) = read_with_report(&mut target, &bytes, SnapshotKind::Message);
    assert_ne!(elements(&target, copy)[0], Value::Ref(existing));
    assert_eq!(report.canonicalized, 0);
}

// ============================================================================
// Full snapshots
// ============================================================================

/// Full reads keep canonical objects as written
#[test]
fn test_full_kind_does_not_intern() {
    let mut heap = ManagedHeap::new();
    let value = Bigint::from_i128(-5);
    let a = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Bigint(value.clone()));
    let b = alloc_tagged(&mut heap, ObjectTags::canonical(), ObjectBody::Bigint(value));
    let root = heap.alloc_array(vec![a.into(), b.into()]).unwrap();

    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Full);
    let mut target = ManagedHeap::new();
    let (copy, report) = read_with_report(&mut target, &bytes, SnapshotKind::Full);
    let els = elements(&target, copy);
    assert_ne!(els[0], els[1]);
    assert_eq!(report.canonicalized, 0);
    assert!(target.get(els[0].as_ref().unwrap()).unwrap().tags.canonical);
}

/// A full snapshot with a tampered string hash is rejected
#[test]
fn test_full_kind_verifies_string_hash() {
    init_tracing();
    let mut heap = ManagedHeap::new();
    let s = heap.symbol("abc").unwrap();
    let mut bytes = snapshot_bytes(&heap, s.into(), SnapshotKind::Full);

    // Inlined(3) | class | tags(2) | len | hash varint...
    let hash_at = heapsnap_snapshot::snapshot::ENVELOPE_HEADER_SIZE + 2 + 1 + 2 + 1;
    bytes[hash_at] ^= 0x01;

    let mut target = ManagedHeap::new();
    let err = read_bytes(&mut target, &bytes, SnapshotKind::Full).unwrap_err();
    assert!(matches!(err, SnapshotError::HashMismatch { .. }), "{err:?}");

    let lenient = SnapshotConfig::for_testing().with_verify_string_hashes(false);
    let copy = deserialize(
        &mut target,
        &bytes,
        SnapshotKind::Full,
        &CodecRegistry::standard(),
        &lenient,
    )
    .unwrap();
    assert_eq!(target.string_text(copy.as_ref().unwrap()).unwrap(), "abc");
}
