//! Regular expression codec
//!
//! ```text
//! num_bracket_expressions: varint | pattern | type_flags: zigzag | flags: zigzag
//! ```
//!
//! The compiled matching program is never transmitted. A regular expression
//! read from a snapshot has no program and is counted in the read report so
//! the embedder can recompile it.

use heapsnap_core::{ClassId, Handle, HeapObject, ObjectBody, RegExpObject, Value};
use tracing::debug;

use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::reader::SnapshotReader;
use crate::registry::ObjectCodec;
use crate::writer::SnapshotWriter;

/// Regular expression without its compiled program
#[derive(Debug)]
pub struct RegExpCodec;

impl ObjectCodec for RegExpCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::JsRegExp]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::RegExp(regexp) = &object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(regexp.num_bracket_expressions);
        writer.write_value(regexp.pattern)?;
        let stream = writer.stream();
        stream.write_zigzag(regexp.type_flags);
        stream.write_zigzag(regexp.flags);
        Ok(())
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let offset = reader.stream().position();
        let brackets = reader.stream().read_varint()?;
        let num_bracket_expressions = usize::try_from(brackets)
            .map_err(|_| SnapshotError::corrupt(offset, "bracket count overflows"))?;
        let handle = reader.allocate(
            header,
            ObjectBody::RegExp(RegExpObject {
                num_bracket_expressions,
                pattern: Value::Null,
                type_flags: 0,
                flags: 0,
                program: None,
            }),
        )?;
        reader.register(id, handle)?;

        let read_pattern = reader.read_value()?;
        let read_type_flags = reader.stream().read_zigzag()?;
        let read_flags = reader.stream().read_zigzag()?;
        reader.patch(handle, |body| {
            if let ObjectBody::RegExp(regexp) = body {
                regexp.pattern = read_pattern;
                regexp.type_flags = read_type_flags;
                regexp.flags = read_flags;
            }
        })?;

        debug!(id, "Regular expression needs recompilation");
        reader.note_regex_recompilation();
        Ok(handle)
    }
}
