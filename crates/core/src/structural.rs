//! Structural graph comparison
//!
//! Two values are structurally equal when there is a bijection between the
//! objects reachable from each that preserves class, payload and edges. This
//! compares shape, not identity: sharing and cycles must match exactly, but
//! handles may differ. External storage, cached string hashes, compiled regex
//! programs and the created-from-snapshot tag are ignored.

use rustc_hash::FxHashMap;

use crate::object::{HeapObject, ObjectBody};
use crate::traits::ObjectStore;
use crate::types::{Handle, Value};

/// Compare the graph under `a` in `a_heap` with the graph under `b` in `b_heap`
pub fn structurally_equal(
    a_heap: &dyn ObjectStore,
    a: Value,
    b_heap: &dyn ObjectStore,
    b: Value,
) -> bool {
    let mut forward: FxHashMap<Handle, Handle> = FxHashMap::default();
    let mut backward: FxHashMap<Handle, Handle> = FxHashMap::default();
    let mut pending = vec![(a, b)];

    while let Some((a, b)) = pending.pop() {
        let (ha, hb) = match (a, b) {
            (Value::Ref(ha), Value::Ref(hb)) => (ha, hb),
            (a, b) => {
                if a != b {
                    return false;
                }
                continue;
            }
        };

        match (forward.get(&ha), backward.get(&hb)) {
            (Some(&mapped), _) if mapped != hb => return false,
            (_, Some(&mapped)) if mapped != ha => return false,
            (Some(_), Some(_)) => continue,
            _ => {}
        }
        forward.insert(ha, hb);
        backward.insert(hb, ha);

        let (Some(oa), Some(ob)) = (a_heap.object(ha), b_heap.object(hb)) else {
            return false;
        };
        if !same_payload(oa, ob) {
            return false;
        }
        let (pa, pb) = (oa.pointers(), ob.pointers());
        if pa.len() != pb.len() {
            return false;
        }
        pending.extend(pa.into_iter().zip(pb));
    }
    true
}

fn same_payload(a: &HeapObject, b: &HeapObject) -> bool {
    if a.class_id().wire_class() != b.class_id().wire_class() {
        return false;
    }
    let (ta, tb) = (a.tags, b.tags);
    if (ta.canonical, ta.is_const, ta.is_static, ta.is_final)
        != (tb.canonical, tb.is_const, tb.is_static, tb.is_final)
    {
        return false;
    }
    match (&a.body, &b.body) {
        (ObjectBody::Record(ra), ObjectBody::Record(rb)) => ra.scalars() == rb.scalars(),
        (
            ObjectBody::ContextScope {
                num_variables: na, ..
            },
            ObjectBody::ContextScope {
                num_variables: nb, ..
            },
        ) => na == nb,
        (ObjectBody::Mint(x), ObjectBody::Mint(y)) => x == y,
        (ObjectBody::Bigint(x), ObjectBody::Bigint(y)) => x == y,
        (ObjectBody::Double(x), ObjectBody::Double(y)) => x.to_bits() == y.to_bits(),
        (ObjectBody::String(x), ObjectBody::String(y)) => x.units() == y.units(),
        (
            ObjectBody::GrowableArray { length: x, .. },
            ObjectBody::GrowableArray { length: y, .. },
        ) => x == y,
        (ObjectBody::ByteArray(x), ObjectBody::ByteArray(y)) => x.bytes() == y.bytes(),
        (ObjectBody::RegExp(x), ObjectBody::RegExp(y)) => {
            (x.num_bracket_expressions, x.type_flags, x.flags)
                == (y.num_bracket_expressions, y.type_flags, y.flags)
        }
        // Remaining bodies are pointer lists; lengths are checked by the caller.
        (ObjectBody::TypeArguments { .. }, ObjectBody::TypeArguments { .. })
        | (ObjectBody::TokenStream { .. }, ObjectBody::TokenStream { .. })
        | (ObjectBody::Context { .. }, ObjectBody::Context { .. })
        | (ObjectBody::Array(_), ObjectBody::Array(_))
        | (ObjectBody::Opaque { .. }, ObjectBody::Opaque { .. }) => true,
        _ => false,
    }
}
