//! Graph shape tests: sharing, cycles, ordering, determinism

mod common;

use common::*;
use heapsnap_snapshot::header::{read_marker, read_object_header, Marker};
use heapsnap_snapshot::stream::StreamReader;

// ============================================================================
// Sharing
// ============================================================================

/// A child referenced twice is one object on both sides
#[test]
fn test_shared_child_stays_shared() {
    let mut heap = ManagedHeap::new();
    let child = heap.alloc_string("shared").unwrap();
    let root = heap.alloc_array(vec![child.into(), child.into()]).unwrap();

    let (target, copy) = roundtrip(&heap, root.into(), SnapshotKind::Message);
    let ObjectBody::Array(array) = &target.get(copy.as_ref().unwrap()).unwrap().body else {
        panic!("root is not an array");
    };
    assert_eq!(array.elements[0], array.elements[1]);
    assert_eq!(target.len(), 2);
}

/// Equal but distinct objects stay distinct
#[test]
fn test_distinct_equal_objects_stay_distinct() {
    let mut heap = ManagedHeap::new();
    let a = heap.alloc_mint(5).unwrap();
    let b = heap.alloc_mint(5).unwrap();
    let root = heap.alloc_array(vec![a.into(), b.into()]).unwrap();

    let (target, copy) = roundtrip(&heap, root.into(), SnapshotKind::Message);
    let ObjectBody::Array(array) = &target.get(copy.as_ref().unwrap()).unwrap().body else {
        panic!("root is not an array");
    };
    assert_ne!(array.elements[0], array.elements[1]);
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_self_referential_context() {
    let mut heap = ManagedHeap::new();
    let ctx = heap
        .alloc(ObjectBody::Context {
            parent: Value::Null,
            variables: vec![Value::Null, Value::Smi(9)],
        })
        .unwrap();
    if let ObjectBody::Context { variables, .. } = &mut heap.object_mut(ctx).unwrap().body {
        variables[0] = ctx.into();
    }

    for kind in [SnapshotKind::Full, SnapshotKind::Script, SnapshotKind::Message] {
        let (target, copy) = roundtrip(&heap, ctx.into(), kind);
        let handle = copy.as_ref().unwrap();
        let ObjectBody::Context { variables, .. } = &target.get(handle).unwrap().body else {
            panic!("root is not a context");
        };
        assert_eq!(variables[0], Value::Ref(handle), "cycle closes on the copy");
        assert_same_graph(&heap, ctx.into(), &target, copy);
    }
}

#[test]
fn test_parent_chain_with_back_edge() {
    let mut heap = ManagedHeap::new();
    let outer = heap
        .alloc(ObjectBody::Context {
            parent: Value::Null,
            variables: vec![Value::Null],
        })
        .unwrap();
    let inner = heap
        .alloc(ObjectBody::Context {
            parent: outer.into(),
            variables: vec![outer.into()],
        })
        .unwrap();
    if let ObjectBody::Context { variables, .. } = &mut heap.object_mut(outer).unwrap().body {
        variables[0] = inner.into();
    }

    let (target, copy) = roundtrip(&heap, inner.into(), SnapshotKind::Message);
    assert_same_graph(&heap, inner.into(), &target, copy);
    assert_eq!(target.len(), 2);
}

#[test]
fn test_array_containing_itself() {
    let mut heap = ManagedHeap::new();
    let array = heap.alloc_array(vec![Value::Null]).unwrap();
    if let ObjectBody::Array(a) = &mut heap.object_mut(array).unwrap().body {
        a.elements[0] = array.into();
    }
    let (target, copy) = roundtrip(&heap, array.into(), SnapshotKind::Message);
    assert_same_graph(&heap, array.into(), &target, copy);
}

// ============================================================================
// Ordering and determinism
// ============================================================================

/// Ids follow depth-first, first-encounter order
#[test]
fn test_ids_in_depth_first_order() {
    let mut heap = ManagedHeap::new();
    let leaf = heap.alloc_mint(1).unwrap();
    let left = heap.alloc_array(vec![leaf.into()]).unwrap();
    let right = heap.alloc_mint(2).unwrap();
    let root = heap.alloc_array(vec![left.into(), right.into()]).unwrap();

    let bytes = snapshot_bytes(&heap, root.into(), SnapshotKind::Message);
    let (_, payload) = Snapshot::parse(&bytes).unwrap();
    let mut r = StreamReader::new(payload);

    let mut inlined = Vec::new();
    while !r.is_at_end() {
        match read_marker(&mut r).unwrap() {
            Marker::Inlined(id) => {
                let header = read_object_header(&mut r).unwrap();
                inlined.push((id, header.class_id));
                match header.class_id {
                    ClassId::Array => {
                        r.read_varint().unwrap();
                    }
                    ClassId::Mint => {
                        r.read_i64().unwrap();
                    }
                    other => panic!("unexpected {other}"),
                }
            }
            Marker::ObjectId(_) | Marker::Smi(_) | Marker::ClassId(_) => {}
        }
    }
    assert_eq!(
        inlined,
        vec![
            (3, ClassId::Array),
            (4, ClassId::Array),
            (5, ClassId::Mint),
            (6, ClassId::Mint),
        ]
    );
}

/// Identical graphs produce identical bytes
#[test]
fn test_output_is_deterministic() {
    fn build() -> (ManagedHeap, Value) {
        let mut heap = ManagedHeap::new();
        let lib = library(&mut heap, "pkg:det");
        let cls = class(&mut heap, 7, "Det");
        let f = function(&mut heap, "run", cls);
        let n = heap.alloc_double(1.5).unwrap();
        let root = heap
            .alloc_array(vec![lib.into(), f.into(), n.into(), f.into()])
            .unwrap();
        (heap, root.into())
    }
    let (a, ra) = build();
    let (b, rb) = build();
    let first = snapshot_bytes(&a, ra, SnapshotKind::Full);
    assert_eq!(first, snapshot_bytes(&a, ra, SnapshotKind::Full));
    assert_eq!(first, snapshot_bytes(&b, rb, SnapshotKind::Full));
}

/// A copy serializes to the same bytes as its original
#[test]
fn test_copy_reserializes_identically() {
    let mut heap = ManagedHeap::new();
    let s = heap.alloc_string("again").unwrap();
    let m = heap.alloc_mint(-77).unwrap();
    let root = heap.alloc_array(vec![s.into(), m.into(), s.into()]).unwrap();

    let original = snapshot_bytes(&heap, root.into(), SnapshotKind::Message);
    let (target, copy) = roundtrip(&heap, root.into(), SnapshotKind::Message);
    assert_eq!(snapshot_bytes(&target, copy, SnapshotKind::Message), original);
}

#[test]
fn test_write_report_counts() {
    init_tracing();
    let mut heap = ManagedHeap::new();
    let s = heap.alloc_string("x").unwrap();
    let root = heap.alloc_array(vec![s.into(), s.into(), s.into()]).unwrap();
    let (snapshot, report) = serialize_with_report(
        &heap,
        root.into(),
        SnapshotKind::Message,
        &CodecRegistry::standard(),
        &SnapshotConfig::for_testing(),
    )
    .unwrap();
    assert_eq!(
        report,
        WriteReport {
            objects_written: 2,
            back_references: 2,
            class_references: 0,
            bytes: snapshot.payload().len(),
        }
    );
}
