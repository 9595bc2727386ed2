//! Snapshot writer
//!
//! Depth-first traversal from a root value. Each heap object is written in
//! full the first time it is encountered and as a back-reference afterwards,
//! so shared and cyclic graphs are emitted once. Ids are assigned in
//! first-encounter order, which makes the output a pure function of the
//! graph shape and the kind.
//!
//! The heap is borrowed shared for the whole pass, inside a no-collection
//! scope. Nothing in the heap is modified.

use heapsnap_core::{
    class_index, Handle, HeapError, HeapObject, NoCollectionScope, SnapshotHeap, Value,
};
use tracing::{debug, trace};

use crate::backref::WriterRefTable;
use crate::config::SnapshotConfig;
use crate::error::{Result, SnapshotError};
use crate::header::{
    write_marker, write_object_header, Marker, ObjectHeader, FALSE_ID, NULL_ID, TRUE_ID,
};
use crate::policy::{self, SnapshotKind};
use crate::registry::CodecRegistry;
use crate::snapshot::Snapshot;
use crate::stream::StreamWriter;

/// Counters collected by a write pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Objects written in full
    pub objects_written: usize,
    /// Back-references emitted for already written objects
    pub back_references: usize,
    /// Classes abbreviated to their class-table index
    pub class_references: usize,
    /// Payload size
    pub bytes: usize,
}

/// State of one write pass
///
/// Codecs receive it in [`ObjectCodec::write_to`](crate::ObjectCodec::write_to)
/// and use it to emit scalars and nested values.
pub struct SnapshotWriter<'a> {
    heap: &'a dyn SnapshotHeap,
    registry: &'a CodecRegistry,
    config: &'a SnapshotConfig,
    kind: SnapshotKind,
    stream: StreamWriter,
    refs: WriterRefTable,
    depth: usize,
    report: WriteReport,
}

impl<'a> SnapshotWriter<'a> {
    /// Create a writer over `heap`
    pub fn new(
        heap: &'a dyn SnapshotHeap,
        kind: SnapshotKind,
        registry: &'a CodecRegistry,
        config: &'a SnapshotConfig,
    ) -> Self {
        SnapshotWriter {
            heap,
            registry,
            config,
            kind,
            stream: StreamWriter::new(),
            refs: WriterRefTable::new(config.max_object_id),
            depth: 0,
            report: WriteReport::default(),
        }
    }

    /// Kind of this pass
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    /// Output stream for scalar payload fields
    pub fn stream(&mut self) -> &mut StreamWriter {
        &mut self.stream
    }

    /// Object behind a handle
    pub fn object(&self, handle: Handle) -> Result<&'a HeapObject> {
        let heap = self.heap;
        heap.object(handle)
            .ok_or(SnapshotError::Heap(HeapError::InvalidHandle(handle)))
    }

    /// Write one slot value
    pub fn write_value(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Null => write_marker(&mut self.stream, Marker::ObjectId(NULL_ID)),
            Value::Bool(true) => write_marker(&mut self.stream, Marker::ObjectId(TRUE_ID)),
            Value::Bool(false) => write_marker(&mut self.stream, Marker::ObjectId(FALSE_ID)),
            Value::Smi(v) => write_marker(&mut self.stream, Marker::Smi(v)),
            Value::Ref(handle) => return self.write_object(handle),
        }
        Ok(())
    }

    /// Write slot values in order
    pub fn write_values(&mut self, values: &[Value]) -> Result<()> {
        for &value in values {
            self.write_value(value)?;
        }
        Ok(())
    }

    fn write_object(&mut self, handle: Handle) -> Result<()> {
        if let Some(id) = self.refs.has(handle) {
            write_marker(&mut self.stream, Marker::ObjectId(id));
            self.report.back_references += 1;
            return Ok(());
        }

        let object = self.object(handle)?;
        let class_id = object.class_id();
        if policy::by_class_reference(class_id, object.tags, self.kind) {
            let index = class_index(self.heap, handle)?;
            write_marker(&mut self.stream, Marker::ClassId(index));
            self.report.class_references += 1;
            return Ok(());
        }

        policy::check_inline(class_id, self.kind)?;
        policy::check_transmissible(class_id, object.tags, self.kind)?;
        let wire_class = class_id.wire_class();
        let registry = self.registry;
        let codec = registry.lookup(wire_class)?;

        let id = self.refs.assign(handle)?;
        trace!(id, class = %wire_class, "Writing object");
        write_marker(&mut self.stream, Marker::Inlined(id));
        write_object_header(
            &mut self.stream,
            ObjectHeader {
                class_id: wire_class,
                tags: object.tags,
            },
        );

        if self.depth >= self.config.max_depth {
            return Err(SnapshotError::NestingTooDeep {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        let result = codec.write_to(self, object);
        self.depth -= 1;
        result?;

        self.report.objects_written += 1;
        Ok(())
    }

    /// Finish the pass and take the payload
    pub fn finish(self) -> (Vec<u8>, WriteReport) {
        let mut report = self.report;
        report.bytes = self.stream.len();
        (self.stream.into_inner(), report)
    }
}

/// Serialize the graph reachable from `root`
///
/// # Errors
///
/// Fails on the first object the kind does not allow, on any limit in
/// `config`, or on a heap inconsistency. No partial snapshot is returned.
pub fn serialize(
    heap: &dyn SnapshotHeap,
    root: Value,
    kind: SnapshotKind,
    registry: &CodecRegistry,
    config: &SnapshotConfig,
) -> Result<Snapshot> {
    serialize_with_report(heap, root, kind, registry, config).map(|(snapshot, _)| snapshot)
}

/// Serialize and return the pass counters
pub fn serialize_with_report(
    heap: &dyn SnapshotHeap,
    root: Value,
    kind: SnapshotKind,
    registry: &CodecRegistry,
    config: &SnapshotConfig,
) -> Result<(Snapshot, WriteReport)> {
    config.validate()?;
    let scope = NoCollectionScope::enter(heap);
    debug!(kind = %kind, "Snapshot write started");

    let mut writer = SnapshotWriter::new(&*scope, kind, registry, config);
    writer.write_value(root)?;
    let (payload, report) = writer.finish();

    debug!(
        kind = %kind,
        objects = report.objects_written,
        back_references = report.back_references,
        class_references = report.class_references,
        bytes = report.bytes,
        "Snapshot write finished"
    );
    Ok((Snapshot::new(kind, payload), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapsnap_core::{ClassId, ManagedHeap, ObjectBody};

    fn write(heap: &ManagedHeap, root: Value, kind: SnapshotKind) -> Result<(Snapshot, WriteReport)> {
        serialize_with_report(
            heap,
            root,
            kind,
            &CodecRegistry::standard(),
            &SnapshotConfig::for_testing(),
        )
    }

    #[test]
    fn test_immediates_need_no_ids() {
        let heap = ManagedHeap::new();
        let (snapshot, report) = write(&heap, Value::Smi(-3), SnapshotKind::Message).unwrap();
        assert_eq!(snapshot.payload(), &[4, 5]);
        assert_eq!(report.objects_written, 0);

        let (snapshot, _) = write(&heap, Value::Null, SnapshotKind::Message).unwrap();
        assert_eq!(snapshot.payload(), &[2, 0]);
    }

    #[test]
    fn test_shared_child_written_once() {
        let mut heap = ManagedHeap::new();
        let child = heap.alloc_mint(7).unwrap();
        let root = heap
            .alloc_array(vec![child.into(), child.into(), child.into()])
            .unwrap();
        let (_, report) = write(&heap, root.into(), SnapshotKind::Message).unwrap();
        assert_eq!(report.objects_written, 2);
        assert_eq!(report.back_references, 2);
    }

    #[test]
    fn test_gc_scope_released_after_failure() {
        let mut heap = ManagedHeap::new();
        let code = heap
            .alloc_with(ClassId::Code, Default::default(), ObjectBody::Opaque { slots: vec![] })
            .unwrap();
        let err = write(&heap, code.into(), SnapshotKind::Full).unwrap_err();
        assert!(err.is_policy_violation());
        assert_eq!(heap.gate().depth(), 0);
    }

    #[test]
    fn test_depth_limit() {
        let mut heap = ManagedHeap::new();
        let mut value = Value::Null;
        for _ in 0..10 {
            value = heap.alloc_array(vec![value]).unwrap().into();
        }
        let config = SnapshotConfig::for_testing().with_max_depth(5);
        let err = serialize(
            &heap,
            value,
            SnapshotKind::Message,
            &CodecRegistry::standard(),
            &config,
        )
        .unwrap_err();
        assert_eq!(err, SnapshotError::NestingTooDeep { limit: 5 });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let heap = ManagedHeap::new();
        let config = SnapshotConfig::default().with_max_depth(0);
        let err = serialize(
            &heap,
            Value::Null,
            SnapshotKind::Message,
            &CodecRegistry::standard(),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Config(_)));
    }
}
