//! Program structure and context codecs
//!
//! Functions, fields, literal tokens, scripts and library prefixes are plain
//! records. Libraries have a reduced form in script snapshots: a library
//! already resident in the target heap travels as its URL only.

use std::sync::Arc;

use heapsnap_core::{
    ClassId, Handle, HeapObject, ObjectBody, ResidentCategory, Value, SLOTS_PER_VARIABLE,
};
use tracing::trace;

use super::record::{read_record, write_record, RecordCodec};
use super::unexpected_body;
use crate::error::{Result, SnapshotError};
use crate::header::ObjectHeader;
use crate::policy::library_by_key;
use crate::reader::SnapshotReader;
use crate::registry::ObjectCodec;
use crate::writer::SnapshotWriter;

/// Library, in full or by URL
#[derive(Debug)]
pub struct LibraryCodec;

impl ObjectCodec for LibraryCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Library]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        if !library_by_key(object.tags, writer.kind()) {
            return write_record(writer, object);
        }
        let url = object
            .as_record()
            .and_then(|r| r.get("url"))
            .ok_or_else(|| unexpected_body(object))?;
        writer.write_value(url)
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        if !library_by_key(header.tags, reader.kind()) {
            let handle = read_record(reader, id, header)?;
            reader.defer_library(handle);
            return Ok(handle);
        }
        let url = reader.read_value()?;
        let key = reader.string_text(url)?;
        let handle = reader.resident(ResidentCategory::Library, &key)?;
        trace!(id, url = %key, "Resolved resident library");
        reader.register(id, handle)?;
        Ok(handle)
    }
}

/// Token stream: `len: varint | tokens...`
#[derive(Debug)]
pub struct TokenStreamCodec;

impl ObjectCodec for TokenStreamCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::TokenStream]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::TokenStream { tokens } = &object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(tokens.len());
        writer.write_values(tokens)
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
            ObjectBody::TokenStream {
                tokens: vec![Value::Null; len],
            },
        )?;
        reader.register(id, handle)?;

        let read = reader.read_values(len)?;
        reader.patch(handle, |body| {
            if let ObjectBody::TokenStream { tokens } = body {
                *tokens = read;
            }
        })?;
        Ok(handle)
    }
}

/// Context: `num_variables: varint | parent | variables...`
#[derive(Debug)]
pub struct ContextCodec;

impl ObjectCodec for ContextCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::Context]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::Context { parent, variables } = &object.body else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(variables.len());
        writer.write_value(*parent)?;
        writer.write_values(variables)
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
            ObjectBody::Context {
                parent: Value::Null,
                variables: vec![Value::Null; len],
            },
        )?;
        reader.register(id, handle)?;

        let read_parent = reader.read_value()?;
        let read_variables = reader.read_values(len)?;
        reader.patch(handle, |body| {
            if let ObjectBody::Context { parent, variables } = body {
                *parent = read_parent;
                *variables = read_variables;
            }
        })?;
        Ok(handle)
    }
}

/// Context scope: `num_variables: varint | slots...`
///
/// Each variable is described by [`SLOTS_PER_VARIABLE`] slots.
#[derive(Debug)]
pub struct ContextScopeCodec;

impl ObjectCodec for ContextScopeCodec {
    fn class_ids(&self) -> &[ClassId] {
        &[ClassId::ContextScope]
    }

    fn write_to(&self, writer: &mut SnapshotWriter<'_>, object: &HeapObject) -> Result<()> {
        let ObjectBody::ContextScope {
            num_variables,
            slots,
        } = &object.body
        else {
            return Err(unexpected_body(object));
        };
        writer.stream().write_len(*num_variables);
        writer.write_values(slots)
    }

    fn read_from(
        &self,
        reader: &mut SnapshotReader<'_>,
        id: u32,
        header: ObjectHeader,
    ) -> Result<Handle> {
        let offset = reader.stream().position();
        let num_variables = reader.read_count(SLOTS_PER_VARIABLE)?;
        let len = num_variables
            .checked_mul(SLOTS_PER_VARIABLE)
            .ok_or_else(|| SnapshotError::corrupt(offset, "context scope too large"))?;
        let handle = reader.allocate(
            header,
            ObjectBody::ContextScope {
                num_variables,
                slots: vec![Value::Null; len],
            },
        )?;
        reader.register(id, handle)?;

        let read = reader.read_values(len)?;
        reader.patch(handle, |body| {
            if let ObjectBody::ContextScope { slots, .. } = body {
                *slots = read;
            }
        })?;
        Ok(handle)
    }
}

pub(crate) fn codecs() -> Vec<Arc<dyn ObjectCodec>> {
    vec![
        Arc::new(RecordCodec::new(ClassId::Function)),
        Arc::new(RecordCodec::new(ClassId::Field)),
        Arc::new(RecordCodec::new(ClassId::LiteralToken)),
        Arc::new(TokenStreamCodec),
        Arc::new(RecordCodec::new(ClassId::Script)),
        Arc::new(LibraryCodec),
        Arc::new(RecordCodec::new(ClassId::LibraryPrefix)),
        Arc::new(ContextCodec),
        Arc::new(ContextScopeCodec),
    ]
}
