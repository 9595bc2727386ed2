//! Type metadata codecs
//!
//! Classes, unresolved classes, types, type parameters and type-argument
//! vectors. Types and type-argument vectors are canonical values; classes
//! read in full are installed in the class table once the pass succeeds.

use std::sync::Arc;

use heapsnap_core::{ClassId, Handle, HeapObject, ObjectBody, Value};

use super::record::{read_record, write_record, RecordCodec};
use super::unexpected_body;
use crate::error::Result;
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::registry::{AllocationStrategy, ObjectCodec};
use crate::writer::SnapshotWriter;

/// Class written in full
///
/// Resident classes in script snapshots and every class in message
/// snapshots never reach this codec; the writer emits a class-id reference
/// instead.
#[derive(Debug)]
pub struct ClassCodec;

impl ObjectCodec for ClassCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Class]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        write_record(writer, object)
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let handle = read_record(reader, id, header)?;
        reader.defer_class(handle);
        Ok(handle)
    }
}

/// Type-argument vector: `len: varint | types...`
#[derive(Debug)]
pub struct TypeArgumentsCodec;

impl ObjectCodec for TypeArgumentsCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::TypeArguments]
    }

    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::CanonicalValue
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::TypeArguments { types } = &object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(types.len());
        writer.write_values(types)
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let len = reader.read_len()?;
        let handle = reader.allocate(
            header,
            ObjectBody::TypeArguments {
                types: vec![Value::Null; len],
            },
        )?;
        reader.register(id, handle)?;

        let read = reader.read_values(len)?;
        reader.patch(handle, |body| {
            if let ObjectBody::TypeArguments { types } = body {
                *types = read;
            }
        })?;
        Ok(handle)
    }
}

pub(crate) fn codecs() -> Vec<Arc<dyn ObjectCodec>> {
    vec![
        Arc::new(ClassCodec),
        Arc::new(RecordCodec::new(ClassId::UnresolvedClass)),
        Arc::new(RecordCodec::canonical(ClassId::Type)),
        Arc::new(RecordCodec::new(ClassId::TypeParameter)),
        Arc::new(RecordCodec::new(ClassId::InstantiatedType)),
        Arc::new(RecordCodec::new(ClassId::InstantiatedTypeArguments)),
        Arc::new(TypeArgumentsCodec),
    ]
}
