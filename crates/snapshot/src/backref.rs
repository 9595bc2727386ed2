//! Backward reference tables
//!
//! The writer maps object identity to the id it assigned; the reader maps
//! ids back to handles. Both are scoped to one pass.
//!
//! On the reader side an id is *reserved* as soon as its `Inlined` marker is
//! consumed and *recorded* once the codec has allocated the object, before
//! any pointer field is read. A back-reference to a reserved but unrecorded
//! id can only come from a corrupt stream.

use heapsnap_core::Handle;
use rustc_hash::FxHashMap;

use crate::error::{Result, SnapshotError};
use crate::header::FIRST_OBJECT_ID;

/// Writer side: heap identity to object id
#[derive(Debug)]
pub struct WriterRefTable {
    ids: FxHashMap<Handle, u32>,
    next_id: u32,
    max_id: u32,
}

impl WriterRefTable {
    /// Create a table that assigns ids up to `max_id`
    pub fn new(max_id: u32) -> Self {
        WriterRefTable {
            ids: FxHashMap::default(),
            next_id: FIRST_OBJECT_ID,
            max_id,
        }
    }

    /// Id already assigned to `handle`
    pub fn has(&self, handle: Handle) -> Option<u32> {
        self.ids.get(&handle).copied()
    }

    /// Assign the next id to a first-encountered object
    pub fn assign(&mut self, handle: Handle) -> Result<u32> {
        if self.next_id > self.max_id {
            return Err(SnapshotError::IdSpaceExhausted { limit: self.max_id });
        }
        let id = self.next_id;
        if self.ids.insert(handle, id).is_some() {
            return Err(SnapshotError::DuplicateBackReference(id));
        }
        self.next_id += 1;
        Ok(id)
    }

    /// Number of ids assigned
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no id was assigned
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Reserved,
    Recorded(Handle),
}

/// Reader side: object id to handle
#[derive(Debug, Default)]
pub struct ReaderRefTable {
    slots: Vec<Slot>,
}

impl ReaderRefTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next `Inlined` object must carry
    pub fn next_id(&self) -> u32 {
        FIRST_OBJECT_ID + self.slots.len() as u32
    }

    /// Claim the next id ahead of allocation
    pub fn reserve(&mut self, id: u32) -> Result<()> {
        let expected = self.next_id();
        if id != expected {
            return Err(SnapshotError::IdMismatch {
                expected,
                found: id,
            });
        }
        self.slots.push(Slot::Reserved);
        Ok(())
    }

    /// Register the handle for a reserved id, at most once
    pub fn record(&mut self, id: u32, handle: Handle) -> Result<()> {
        let slot = self.slot_mut(id)?;
        match *slot {
            Slot::Reserved => {
                *slot = Slot::Recorded(handle);
                Ok(())
            }
            Slot::Recorded(_) => Err(SnapshotError::DuplicateBackReference(id)),
        }
    }

    /// Replace the handle of a recorded id with its canonical instance
    pub fn repoint(&mut self, id: u32, handle: Handle) -> Result<()> {
        match self.slot_mut(id)? {
            Slot::Recorded(old) => {
                *old = handle;
                Ok(())
            }
            Slot::Reserved => Err(SnapshotError::UnresolvedReference(id)),
        }
    }

    /// Handle recorded for an id
    pub fn lookup(&self, id: u32) -> Result<Handle> {
        let index = id
            .checked_sub(FIRST_OBJECT_ID)
            .ok_or(SnapshotError::UnknownObjectId(id))?;
        match self.slots.get(index as usize) {
            Some(Slot::Recorded(handle)) => Ok(*handle),
            Some(Slot::Reserved) => Err(SnapshotError::UnresolvedReference(id)),
            None => Err(SnapshotError::UnknownObjectId(id)),
        }
    }

    /// True once `id` has a handle
    pub fn is_recorded(&self, id: u32) -> bool {
        self.lookup(id).is_ok()
    }

    /// Number of ids reserved so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no id was reserved
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, id: u32) -> Result<&mut Slot> {
        id.checked_sub(FIRST_OBJECT_ID)
            .and_then(|i| self.slots.get_mut(i as usize))
            .ok_or(SnapshotError::UnknownObjectId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(i: u32) -> Handle {
        Handle::from_index(i)
    }

    #[test]
    fn test_writer_assigns_in_encounter_order() {
        let mut table = WriterRefTable::new(u32::MAX - 1);
        assert_eq!(table.assign(h(40)).unwrap(), FIRST_OBJECT_ID);
        assert_eq!(table.assign(h(7)).unwrap(), FIRST_OBJECT_ID + 1);
        assert_eq!(table.has(h(40)), Some(FIRST_OBJECT_ID));
        assert_eq!(table.has(h(8)), None);
        assert!(table.assign(h(7)).is_err());
    }

    #[test]
    fn test_writer_id_space_limit() {
        let mut table = WriterRefTable::new(FIRST_OBJECT_ID);
        table.assign(h(0)).unwrap();
        assert_eq!(
            table.assign(h(1)),
            Err(SnapshotError::IdSpaceExhausted {
                limit: FIRST_OBJECT_ID
            })
        );
    }

    #[test]
    fn test_reader_reserve_then_record() {
        let mut table = ReaderRefTable::new();
        table.reserve(3).unwrap();
        assert_eq!(table.lookup(3), Err(SnapshotError::UnresolvedReference(3)));
        table.record(3, h(9)).unwrap();
        assert_eq!(table.lookup(3), Ok(h(9)));
        assert_eq!(table.record(3, h(10)), Err(SnapshotError::DuplicateBackReference(3)));
    }

    #[test]
    fn test_reader_rejects_out_of_order_ids() {
        let mut table = ReaderRefTable::new();
        assert_eq!(
            table.reserve(5),
            Err(SnapshotError::IdMismatch {
                expected: 3,
                found: 5
            })
        );
        assert_eq!(table.lookup(1), Err(SnapshotError::UnknownObjectId(1)));
        assert_eq!(table.lookup(3), Err(SnapshotError::UnknownObjectId(3)));
    }

    #[test]
    fn test_repoint_keeps_id() {
        let mut table = ReaderRefTable::new();
        table.reserve(3).unwrap();
        table.record(3, h(1)).unwrap();
        table.reserve(4).unwrap();
        table.record(4, h(2)).unwrap();
        table.repoint(3, h(0)).unwrap();
        assert_eq!(table.lookup(3), Ok(h(0)));
        assert_eq!(table.lookup(4), Ok(h(2)));
        assert_eq!(table.next_id(), 5);
    }
}
