//! String codec
//!
//! ```text
//! len: varint | hash: varint | code units, LE at the class's width
//! ```
//!
//! Externally backed strings are flattened into the internal class of the
//! same width. Full snapshots trust the stored hash (optionally verifying
//! it); other kinds drop it and let the target heap recompute on demand.

use std::sync::Arc;

use heapsnap_core::{CharWidth, ClassId, CodeUnits, Handle, HeapObject, ObjectBody, StringObject};
use tracing::warn;

use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::policy::SnapshotKind;
use crate::reader::SnapshotReader;
use crate::registry::{AllocationStrategy, ObjectCodec};
use crate::writer::SnapshotWriter;

/// Strings of one code-unit width
#[derive(Debug)]
pub struct StringCodec {
    width: CharWidth,
    class_id: [ClassId; 1],
}

impl StringCodec {
    /// Codec for the internal string class of `width`
    pub fn new(width: CharWidth) -> Self {
        StringCodec {
            width,
            class_id: [width.class_id()],
        }
    }
}

impl ObjectCodec for StringCodec {
    fn class_ids(&self) -> &[ClassId] {
        &self.class_id
    }

    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::Symbol
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let string = object.as_string().ok_or_else(|| unexpected_body(object))?;
        let units = string.units();
        let stream = writer.stream();
        stream.write_len(units.len());
        stream.write_varint(string.hash() as u64);
        match units {
            CodeUnits::One(u) => stream.write_bytes(u),
            CodeUnits::Two(u) => u.iter().for_each(|&c| stream.write_u16(c)),
            CodeUnits::Four(u) => u.iter().for_each(|&c| stream.write_u32(c)),
        }
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let len = reader.read_count(self.width.bytes())?;
        let stored = reader.stream().read_varint_u32()?;
        let raw = reader.stream().read_bytes(len * self.width.bytes())?;
        let units = match self.width {
            CharWidth::One => CodeUnits::One(raw.to_vec()),
            CharWidth::Two => CodeUnits::Two(
                raw.chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            CharWidth::Four => CodeUnits::Four(
                raw.chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };

        let mut string = StringObject::internal(units);
        if reader.kind() == SnapshotKind::Full {
            if reader.config().verify_string_hashes {
                let computed = string.units().compute_hash();
                if computed != stored {
                    warn!(id, stored, computed, "String hash mismatch");
                    return Err(SnapshotError::HashMismatch { stored, computed });
                }
            }
            string.hash = stored;
        }

        let handle = reader.allocate(header, ObjectBody::String(string))?;
        reader.register(id, handle)?;
        Ok(handle)
    }
}

pub(crate) fn codecs() -> Vec<Arc<dyn ObjectCodec>> {
    [CharWidth::One, CharWidth::Two, CharWidth::Four]
        .into_iter()
        .map(|width| Arc::new(StringCodec::new(width)) as Arc<dyn ObjectCodec>)
        .collect()
}
