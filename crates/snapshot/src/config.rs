//! Snapshot pass configuration
//!
//! Bounds that protect a pass from hostile or oversized input, plus the
//! full-kind string hash check.

/// Default largest object id
pub const DEFAULT_MAX_OBJECT_ID: u32 = u32::MAX - 1;

/// Default recursion bound
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default largest accepted length prefix
pub const DEFAULT_MAX_PAYLOAD_LEN: u64 = 256 * 1024 * 1024;

/// Snapshot pass configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Largest object id a pass may assign
    pub max_object_id: u32,
    /// Deepest chain of nested inlined objects
    pub max_depth: usize,
    /// Largest length prefix accepted on read
    pub max_payload_len: u64,
    /// Recompute and compare string hashes in full snapshots
    pub verify_string_hashes: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            max_object_id: DEFAULT_MAX_OBJECT_ID,
            max_depth: DEFAULT_MAX_DEPTH,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            verify_string_hashes: true,
        }
    }
}

impl SnapshotConfig {
    /// Create config for testing
    ///
    /// Uses small bounds so limit paths are cheap to reach.
    pub fn for_testing() -> Self {
        SnapshotConfig {
            max_object_id: 4096,
            max_depth: 64,
            max_payload_len: 64 * 1024,
            verify_string_hashes: true,
        }
    }

    /// Set the largest object id
    pub fn with_max_object_id(mut self, max: u32) -> Self {
        self.max_object_id = max;
        self
    }

    /// Set the recursion bound
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the largest accepted length prefix
    pub fn with_max_payload_len(mut self, len: u64) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Enable or disable full-kind string hash verification
    pub fn with_verify_string_hashes(mut self, verify: bool) -> Self {
        self.verify_string_hashes = verify;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_object_id < crate::header::FIRST_OBJECT_ID {
            return Err(ConfigError::IdSpaceTooSmall(self.max_object_id));
        }
        if self.max_object_id == u32::MAX {
            return Err(ConfigError::IdSpaceTooLarge);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.max_payload_len == 0 {
            return Err(ConfigError::ZeroPayloadLen);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Id space cannot hold a single heap object
    #[error("max_object_id {0} leaves no room for heap objects")]
    IdSpaceTooSmall(u32),

    /// Id space overlaps the sentinel value
    #[error("max_object_id must be below u32::MAX")]
    IdSpaceTooLarge,

    /// Depth bound of zero
    #[error("max_depth must be at least 1")]
    ZeroDepth,

    /// Payload bound of zero
    #[error("max_payload_len must be at least 1")]
    ZeroPayloadLen,
}
