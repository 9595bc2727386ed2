//! Snapshot pass benchmarks
//!
//! ## Graph Shapes
//!
//! - `flat_strings`: one array of N distinct one-byte strings
//! - `shared_strings`: one array referencing the same string N times
//!   (back-reference path)
//! - `numbers`: mints, doubles and bigints in equal share
//! - `context_chain`: N nested contexts, each holding its parent
//!
//! Every shape is measured on the write pass and on the read pass separately.
//! Read benchmarks decode into a fresh heap per iteration.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench snapshot_passes
//! cargo bench --bench snapshot_passes -- "read/"  # read passes only
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use heapsnap::{
    deserialize, serialize, Bigint, CodecRegistry, ManagedHeap, ObjectBody, SnapshotConfig,
    SnapshotKind, Value,
};

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn flat_strings(n: usize) -> (ManagedHeap, Value) {
    let mut heap = ManagedHeap::new();
    let elements = (0..n)
        .map(|i| heap.alloc_string(&format!("item-{i}")).unwrap().into())
        .collect();
    let root = heap.alloc_array(elements).unwrap();
    (heap, root.into())
}

fn shared_strings(n: usize) -> (ManagedHeap, Value) {
    let mut heap = ManagedHeap::new();
    let s = heap.alloc_string("shared").unwrap();
    let root = heap.alloc_array(vec![s.into(); n]).unwrap();
    (heap, root.into())
}

fn numbers(n: usize) -> (ManagedHeap, Value) {
    let mut heap = ManagedHeap::new();
    let elements = (0..n)
        .map(|i| {
            let handle = match i % 3 {
                0 => heap.alloc_mint(i as i64 * 1_000_003).unwrap(),
                1 => heap.alloc_double(i as f64 / 7.0).unwrap(),
                _ => heap.alloc_bigint(Bigint::from_i128((i as i128) << 80)).unwrap(),
            };
            handle.into()
        })
        .collect();
    let root = heap.alloc_array(elements).unwrap();
    (heap, root.into())
}

fn context_chain(n: usize) -> (ManagedHeap, Value) {
    let mut heap = ManagedHeap::new();
    let mut parent = Value::Null;
    for i in 0..n {
        let ctx = heap
            .alloc(ObjectBody::Context {
                parent,
                variables: vec![Value::Smi(i as i64)],
            })
            .unwrap();
        parent = ctx.into();
    }
    (heap, parent)
}

fn bench_shape(c: &mut Criterion, name: &str, build: fn(usize) -> (ManagedHeap, Value), sizes: &[usize]) {
    let registry = CodecRegistry::standard();
    let config = SnapshotConfig::default().with_max_depth(4_096);

    let mut group = c.benchmark_group(format!("write/{name}"));
    for &n in sizes {
        let (heap, root) = build(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                black_box(serialize(&heap, root, SnapshotKind::Message, &registry, &config).unwrap())
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group(format!("read/{name}"));
    for &n in sizes {
        let (heap, root) = build(n);
        let bytes = serialize(&heap, root, SnapshotKind::Message, &registry, &config)
            .unwrap()
            .to_bytes();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &bytes, |b, bytes| {
            b.iter(|| {
                let mut target = ManagedHeap::new();
                black_box(
                    deserialize(&mut target, bytes, SnapshotKind::Message, &registry, &config)
                        .unwrap(),
                )
            });
        });
    }
    group.finish();
}

fn snapshot_benchmarks(c: &mut Criterion) {
    bench_shape(c, "flat_strings", flat_strings, &SIZES);
    bench_shape(c, "shared_strings", shared_strings, &SIZES);
    bench_shape(c, "numbers", numbers, &SIZES);
    // Nesting is bounded by the recursion limit.
    bench_shape(c, "context_chain", context_chain, &[100, 1_000]);
}

criterion_group!(benches, snapshot_benchmarks);
criterion_main!(benches);
