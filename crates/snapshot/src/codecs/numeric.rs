//! Number codecs
//!
//! ```text
//! Mint   : i64 LE
//! Double : f64 LE
//! Bigint : negative: u8 (0/1) | len: varint | magnitude as lowercase hex ASCII
//! ```
//!
//! All three are canonical values.

use std::sync::Arc;

use heapsnap_core::{Bigint, ClassId, Handle, HeapObject, ObjectBody};

use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::registry::{AllocationStrategy, ObjectCodec};
use crate::writer::SnapshotWriter;

/// 64-bit integer
#[derive(Debug)]
pub struct MintCodec;

impl ObjectCodec for MintCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Mint]
    }

    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::CanonicalValue
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::Mint(value) = object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_i64(value);
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let value = reader.stream().read_i64()?;
        let handle = reader.allocate(header, ObjectBody::Mint(value))?;
        reader.register(id, handle)?;
        Ok(handle)
    }
}

/// Double-precision float, bit-exact
#[derive(Debug)]
pub struct DoubleCodec;

impl ObjectCodec for DoubleCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Double]
    }

    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::CanonicalValue
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::Double(value) = object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_f64(value);
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let value = reader.stream().read_f64()?;
        let handle = reader.allocate(header, ObjectBody::Double(value))?;
        reader.register(id, handle)?;
        Ok(handle)
    }
}

/// Arbitrary-precision integer as sign and hex magnitude
#[derive(Debug)]
pub struct BigintCodec;

impl ObjectCodec for BigintCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Bigint]
    }

    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::CanonicalValue
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::Bigint(value) = &object.body else {
            return Err(unexpected_body(object));
        };
        let hex = value.magnitude_hex();
        let stream = writer.stream();
        stream.write_bool(value.is_negative());
        stream.write_len(hex.len());
        stream.write_bytes(hex.as_bytes());
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let negative = reader.stream().read_bool()?;
        let len = reader.read_len()?;
        let offset = reader.stream().position();
        let text = reader.stream().read_bytes(len)?;
        let value = Bigint::from_magnitude_hex(negative, text)
            .map_err(|e| SnapshotError::corrupt(offset, e.to_string()))?;

        let handle = reader.allocate(header, ObjectBody::Bigint(value))?;
        reader.register(id, handle)?;
        Ok(handle)
    }
}

pub(crate) fn codecs() -> Vec<Arc<dyn ObjectCodec>> {
    vec![
        Arc::new(MintCodec),
        Arc::new(BigintCodec),
        Arc::new(DoubleCodec),
    ]
}
