//! Table-driven codec for fixed-shape categories
//!
//! Payload: every scalar field in declaration order, then every pointer
//! field in declaration order. Ints are zigzag varints, bytes are one
//! signed byte, flags are one `0`/`1` byte.

use heapsnap_core::{ClassId, Handle, HeapObject, ObjectBody, Record, Scalar, ScalarKind};

use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::registry::{AllocationStrategy, ObjectCodec};
use crate::stream::{StreamReader, StreamWriter};
use crate::writer::SnapshotWriter;

/// Codec driven by a category's layout table
#[derive(Debug)]
pub struct RecordCodec {
    class_id: [ClassId; 1],
    strategy: AllocationStrategy,
}

impl RecordCodec {
    /// Plain record codec for one category
    pub fn new(class_id: ClassId) -> Self {
        RecordCodec {
            class_id: [class_id],
            strategy: AllocationStrategy::Plain,
        }
    }

    /// Record codec whose canonical instances are interned as values
    pub fn canonical(class_id: ClassId) -> Self {
        RecordCodec {
            class_id: [class_id],
            strategy: AllocationStrategy::CanonicalValue,
        }
    }
}

impl ObjectCodec for RecordCodec {
    fn class_ids(&self) -> &[ClassId] {
        &self.class_id
    }

    fn strategy(&self) -> AllocationStrategy {
        self.strategy
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
        read_record(reader, id, header)
    }
}

pub(crate) fn write_scalar(w: &mut StreamWriter, scalar: Scalar) {
    match scalar {
        Scalar::Int(v) => w.write_zigzag(v),
        Scalar::Byte(v) => w.write_i8(v),
        Scalar::Bool(v) => w.write_bool(v),
    }
}

pub(crate) fn read_scalar(r: &mut StreamReader<'_>, kind: ScalarKind) -> Result<Scalar> {
    Ok(match kind {
        ScalarKind::Int => Scalar::Int(r.read_zigzag()?),
        ScalarKind::Byte => Scalar::Byte(r.read_i8()?),
        ScalarKind::Bool => Scalar::Bool(r.read_bool()?),
    })
}

/// Write scalars then pointers of a record body
pub(crate) fn write_record(writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
    let record = object.as_record().ok_or_else(|| unexpected_body(object))?;
    for &scalar in record.scalars() {
        write_scalar(writer.stream(), scalar);
    }
    writer.write_values(record.refs())
}

/// Read a record body, registering it before its pointers
pub(crate) fn read_record(
    reader: &mut SnapshotReader<'_>,
    id: u32,
    header: ObjectHeader,
) -> Result<Handle> {
    let mut record =
        Record::new(header.class_id).ok_or(SnapshotError::NoCodec(header.class_id))?;
    for slot in record.scalars_mut() {
        *slot = read_scalar(reader.stream(), slot.kind())?;
    }
    let num_refs = record.layout().num_refs();

    let handle = reader.allocate(header, ObjectBody::Record(record))?;
    reader.register(id, handle)?;

    let refs = reader.read_values(num_refs)?;
    reader.patch(handle, |body| {
        if let ObjectBody::Record(record) = body {
            record.refs_mut().copy_from_slice(&refs);
        }
    })?;
    Ok(handle)
}
