//! Snapshot envelope
//!
//! ## Format
//!
//! ```text
//! +------------------+
//! | Magic (4)        |  "HSNP"
//! | Version (2)      |  u16 LE
//! | Kind (1)         |  1 full, 2 script, 3 message
//! | Reserved (1)     |  zero
//! | Payload len (8)  |  u64 LE
//! +------------------+
//! | Payload          |  marker-framed object stream
//! +------------------+
//! ```

use crate::error::{Result, SnapshotError};
use crate::policy::SnapshotKind;

/// Magic bytes at the start of every envelope
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"HSNP";

/// Current envelope version
pub const SNAPSHOT_VERSION: u16 = 1;

/// Envelope header size in bytes
pub const ENVELOPE_HEADER_SIZE: usize = 16;

/// A serialized object graph and the kind it was written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    kind: SnapshotKind,
    payload: Vec<u8>,
}

impl Snapshot {
    /// Wrap a payload
    pub fn new(kind: SnapshotKind, payload: Vec<u8>) -> Self {
        Snapshot { kind, payload }
    }

    /// Kind the payload was written under
    pub fn kind(&self) -> SnapshotKind {
        self.kind
    }

    /// Marker-framed object stream
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take the payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Envelope plus payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.push(self.kind.as_u8());
        out.push(0);
        out.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse an envelope and copy out its payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (kind, payload) = Self::parse(bytes)?;
        Ok(Snapshot::new(kind, payload.to_vec()))
    }

    /// Validate an envelope and borrow its payload
    pub fn parse(bytes: &[u8]) -> Result<(SnapshotKind, &[u8])> {
        if bytes.len() < ENVELOPE_HEADER_SIZE {
            return Err(SnapshotError::UnexpectedEof {
                offset: 0,
                needed: ENVELOPE_HEADER_SIZE,
            });
        }
        if bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic {
                found: bytes[0..4].to_vec(),
            });
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let kind = SnapshotKind::from_u8(bytes[6]).ok_or_else(|| {
            SnapshotError::corrupt(6, format!("unknown snapshot kind {}", bytes[6]))
        })?;
        if bytes[7] != 0 {
            return Err(SnapshotError::corrupt(7, "reserved envelope byte is not zero"));
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[8..16]);
        let declared = u64::from_le_bytes(len);
        let available = (bytes.len() - ENVELOPE_HEADER_SIZE) as u64;
        if declared > available {
            return Err(SnapshotError::UnexpectedEof {
                offset: bytes.len(),
                needed: usize::try_from(declared - available).unwrap_or(usize::MAX),
            });
        }
        if declared < available {
            return Err(SnapshotError::TrailingBytes((available - declared) as usize));
        }
        Ok((kind, &bytes[ENVELOPE_HEADER_SIZE..]))
    }
}
