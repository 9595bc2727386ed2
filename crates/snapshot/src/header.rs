//! Serialization markers and object headers
//!
//! ```text
//! Inlined   : 0x01 | id: varint | class_id: varint | tags: u16 LE | payload
//! ObjectId  : 0x02 | id: varint
//! ClassId   : 0x03 | class_index: varint
//! Smi       : 0x04 | value: zigzag varint
//! ```
//!
//! Ids 0, 1 and 2 name the predefined `null`, `true` and `false` objects and
//! are only ever written as `ObjectId` markers. Heap objects are numbered
//! from [`FIRST_OBJECT_ID`] in first-encounter order.

use heapsnap_core::{ClassId, ObjectTags};

use crate::error::{Result, SnapshotError};
use crate::stream::{StreamReader, StreamWriter};

/// Predefined id of `null`
pub const NULL_ID: u32 = 0;
/// Predefined id of `true`
pub const TRUE_ID: u32 = 1;
/// Predefined id of `false`
pub const FALSE_ID: u32 = 2;
/// First id assigned to a heap object
pub const FIRST_OBJECT_ID: u32 = 3;

const MARKER_INLINED: u8 = 1;
const MARKER_OBJECT_ID: u8 = 2;
const MARKER_CLASS_ID: u8 = 3;
const MARKER_SMI: u8 = 4;

/// Serialization marker preceding every value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Full payload follows under this id
    Inlined(u32),
    /// Back-reference to an id already assigned, or a predefined id
    ObjectId(u32),
    /// Statically known class by class-table index
    ClassId(u32),
    /// Immediate small integer
    Smi(i64),
}

/// Header following an `Inlined` marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Selects the codec
    pub class_id: ClassId,
    /// Object flags
    pub tags: ObjectTags,
}

/// Write a marker and its id or value
pub fn write_marker(w: &mut StreamWriter, marker: Marker) {
    match marker {
        Marker::Inlined(id) => {
            w.write_u8(MARKER_INLINED);
            w.write_varint(id as u64);
        }
        Marker::ObjectId(id) => {
            w.write_u8(MARKER_OBJECT_ID);
            w.write_varint(id as u64);
        }
        Marker::ClassId(index) => {
            w.write_u8(MARKER_CLASS_ID);
            w.write_varint(index as u64);
        }
        Marker::Smi(value) => {
            w.write_u8(MARKER_SMI);
            w.write_zigzag(value);
        }
    }
}

/// Read a marker; never consumes payload bytes
pub fn read_marker(r: &mut StreamReader<'_>) -> Result<Marker> {
    let offset = r.position();
    match r.read_u8()? {
        MARKER_INLINED => Ok(Marker::Inlined(r.read_varint_u32()?)),
        MARKER_OBJECT_ID => Ok(Marker::ObjectId(r.read_varint_u32()?)),
        MARKER_CLASS_ID => Ok(Marker::ClassId(r.read_varint_u32()?)),
        MARKER_SMI => Ok(Marker::Smi(r.read_zigzag()?)),
        marker => Err(SnapshotError::InvalidMarker { marker, offset }),
    }
}

/// Write the class id and packed tag word
pub fn write_object_header(w: &mut StreamWriter, header: ObjectHeader) {
    w.write_varint(header.class_id.as_u32() as u64);
    w.write_u16(header.tags.pack());
}

/// Read the class id and tag word
pub fn read_object_header(r: &mut StreamReader<'_>) -> Result<ObjectHeader> {
    let raw = r.read_varint_u32()?;
    let class_id = ClassId::from_u32(raw).ok_or(SnapshotError::UnknownClassId(raw))?;
    let tags = ObjectTags::unpack(r.read_u16()?)?;
    Ok(ObjectHeader { class_id, tags })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_layout() {
        let mut w = StreamWriter::new();
        write_marker(&mut w, Marker::Inlined(300));
        write_marker(&mut w, Marker::Smi(-1));
        assert_eq!(w.as_bytes(), &[MARKER_INLINED, 0xAC, 0x02, MARKER_SMI, 0x01]);
    }

    #[test]
    fn test_header_layout() {
        let mut w = StreamWriter::new();
        write_object_header(
            &mut w,
            ObjectHeader {
                class_id: ClassId::Mint,
                tags: ObjectTags::canonical(),
            },
        );
        assert_eq!(w.as_bytes(), &[32, 0x01, 0x00]);

        let bytes = w.into_inner();
        let header = read_object_header(&mut StreamReader::new(&bytes)).unwrap();
        assert_eq!(header.class_id, ClassId::Mint);
        assert!(header.tags.canonical);
    }

    #[test]
    fn test_read_marker_rejects_unknown() {
        let mut r = StreamReader::new(&[9]);
        assert_eq!(
            read_marker(&mut r),
            Err(SnapshotError::InvalidMarker {
                marker: 9,
                offset: 0
            })
        );
    }

    #[test]
    fn test_read_header_rejects_unknown_class_and_tags() {
        let mut r = StreamReader::new(&[99, 0, 0]);
        assert_eq!(read_object_header(&mut r), Err(SnapshotError::UnknownClassId(99)));

        let mut r = StreamReader::new(&[32, 0x00, 0x80]);
        assert!(matches!(
            read_object_header(&mut r),
            Err(SnapshotError::InvalidTags(_))
        ));
    }

    #[test]
    fn test_marker_does_not_consume_payload() {
        let mut w = StreamWriter::new();
        write_marker(&mut w, Marker::ObjectId(TRUE_ID));
        w.write_u8(0xEE);
        let bytes = w.into_inner();
        let mut r = StreamReader::new(&bytes);
        assert_eq!(read_marker(&mut r).unwrap(), Marker::ObjectId(TRUE_ID));
        assert_eq!(r.remaining(), 1);
    }
}
