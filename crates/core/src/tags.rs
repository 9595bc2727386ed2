//! Object tag word
//!
//! Every heap object carries a small set of flags. On the wire they are packed
//! into a fixed-width `u16`; everywhere else they are named booleans.

use thiserror::Error;

const CANONICAL_BIT: u16 = 1 << 0;
const CREATED_FROM_SNAPSHOT_BIT: u16 = 1 << 1;
const CONST_BIT: u16 = 1 << 2;
const STATIC_BIT: u16 = 1 << 3;
const FINAL_BIT: u16 = 1 << 4;

const KNOWN_BITS: u16 =
    CANONICAL_BIT | CREATED_FROM_SNAPSHOT_BIT | CONST_BIT | STATIC_BIT | FINAL_BIT;

/// Flags stored in an object header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectTags {
    /// At most one live instance per distinct value
    pub canonical: bool,
    /// Object was loaded from a snapshot and is resident in its heap
    pub created_from_snapshot: bool,
    /// Const class or const function
    pub is_const: bool,
    /// Static function or field
    pub is_static: bool,
    /// Final field
    pub is_final: bool,
}

/// Tag word with bits outside the known set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reserved tag bits set: {0:#06x}")]
pub struct InvalidTags(pub u16);

impl ObjectTags {
    /// Tags of a canonical value
    pub fn canonical() -> Self {
        ObjectTags {
            canonical: true,
            ..Default::default()
        }
    }

    /// Tags of an object that is already resident in the target heap
    pub fn resident() -> Self {
        ObjectTags {
            created_from_snapshot: true,
            ..Default::default()
        }
    }

    /// Pack into the wire representation
    pub fn pack(self) -> u16 {
        let mut bits = 0;
        if self.canonical {
            bits |= CANONICAL_BIT;
        }
        if self.created_from_snapshot {
            bits |= CREATED_FROM_SNAPSHOT_BIT;
        }
        if self.is_const {
            bits |= CONST_BIT;
        }
        if self.is_static {
            bits |= STATIC_BIT;
        }
        if self.is_final {
            bits |= FINAL_BIT;
        }
        bits
    }

    /// Unpack from the wire representation
    pub fn unpack(bits: u16) -> Result<Self, InvalidTags> {
        if bits & !KNOWN_BITS != 0 {
            return Err(InvalidTags(bits));
        }
        Ok(ObjectTags {
            canonical: bits & CANONICAL_BIT != 0,
            created_from_snapshot: bits & CREATED_FROM_SNAPSHOT_BIT != 0,
            is_const: bits & CONST_BIT != 0,
            is_static: bits & STATIC_BIT != 0,
            is_final: bits & FINAL_BIT != 0,
        })
    }
}
