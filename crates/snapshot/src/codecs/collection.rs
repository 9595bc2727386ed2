//! Array and byte array codecs
//!
//! ```text
//! Array / ImmutableArray : len: varint | type arguments | elements...
//! GrowableObjectArray    : length: varint | backing array
//! InternalByteArray      : len: varint | bytes
//! ```

use std::sync::Arc;

use heapsnap_core::{ArrayObject, ByteStorage, ClassId, Handle, HeapObject, ObjectBody, Value};

use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::registry::ObjectCodec;
use crate::writer::SnapshotWriter;

/// Fixed arrays, mutable or immutable
#[derive(Debug)]
pub struct ArrayCodec;

impl ObjectCodec for ArrayCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Array, ClassId::ImmutableArray]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::Array(array) = &object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(array.elements.len());
        writer.write_value(array.type_arguments)?;
        writer.write_values(&array.elements)
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
            ObjectBody::Array(ArrayObject {
                type_arguments: Value::Null,
                elements: vec![Value::Null; len],
            }),
        )?;
        reader.register(id, handle)?;

        let type_arguments = reader.read_value()?;
        let elements = reader.read_values(len)?;
        reader.patch(handle, |body| {
            if let ObjectBody::Array(array) = body {
                *array = ArrayObject {
                    type_arguments,
                    elements,
                };
            }
        })?;
        Ok(handle)
    }
}

/// Growable array over a backing fixed array
#[derive(Debug)]
pub struct GrowableArrayCodec;

impl ObjectCodec for GrowableArrayCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::GrowableObjectArray]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::GrowableArray { length, data } = &object.body else {
            return Err(unexpected_body(object));
        };
        let backing = match data {
            Value::Ref(handle) => Some(writer.object(*handle)?),
            _ => None,
        };
        if let Some(reason) = backing_problem(*length, *data, backing) {
            return Err(SnapshotError::InvalidObject {
                class_id: ClassId::GrowableObjectArray,
                reason: reason.to_string(),
            });
        }
        writer.stream().write_len(*length);
        writer.write_value(*data)
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let limit = reader.config().max_payload_len;
        let length = reader.stream().read_len(limit)?;
        let handle = reader.allocate(
            header,
            ObjectBody::GrowableArray {
                length,
                data: Value::Null,
            },
        )?;
        reader.register(id, handle)?;

        let offset = reader.stream().position();
        let backing = reader.read_value()?;
        let array = match backing {
            Value::Ref(handle) => Some(reader.object(handle)?),
            _ => None,
        };
        if let Some(reason) = backing_problem(length, backing, array) {
            return Err(SnapshotError::corrupt(offset, reason));
        }
        reader.patch(handle, |body| {
            if let ObjectBody::GrowableArray { data, .. } = body {
                *data = backing;
            }
        })?;
        Ok(handle)
    }
}

/// Why `length` over `backing` is not a valid growable array
///
/// The backing store is a fixed array holding at least `length` elements;
/// only an empty growable array may have none.
fn backing_problem(
    length: usize,
    backing: Value,
    array: Option<&HeapObject>,
) -> Option<&'static str> {
    match (backing, array.map(|object| &object.body)) {
        (Value::Null, _) if length == 0 => None,
        (Value::Null, _) => Some("growable array has a length but no backing array"),
        (Value::Ref(_), Some(ObjectBody::Array(array))) if length <= array.elements.len() => None,
        (Value::Ref(_), Some(ObjectBody::Array(_))) => {
            Some("growable array length exceeds its backing array")
        }
        _ => Some("growable array backing is not a fixed array"),
    }
}

/// Byte arrays; external storage is flattened
#[derive(Debug)]
pub struct ByteArrayCodec;

impl ObjectCodec for ByteArrayCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::InternalByteArray]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::ByteArray(storage) = &object.body else {
            return Err(unexpected_body(object));
        };
        let bytes = storage.bytes();
        let stream = writer.stream();
        stream.write_len(bytes.len());
        stream.write_bytes(bytes);
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let len = reader.read_len()?;
        let bytes = reader.stream().read_bytes(len)?.to_vec();
        let handle = reader.allocate(header, ObjectBody::ByteArray(ByteStorage::Internal(bytes)))?;
        reader.register(id, handle)?;
        Ok(handle)
    }
}

pub(crate) fn codecs() -> Vec<Arc<dyn ObjectCodec>> {
    vec![
        Arc::new(ArrayCodec),
        Arc::new(GrowableArrayCodec),
        Arc::new(ByteArrayCodec),
    ]
}
