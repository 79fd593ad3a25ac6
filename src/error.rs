//! Error types and result definitions

use std::path::PathBuf;

use thiserror::Error;

use crate::core::hashing::DictionaryKey;

/// Result type alias for velocity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for velocity
#[derive(Error, Debug)]
pub enum Error {
    /// A scaled coordinate or pairing output does not fit the configured width.
    /// Reduce the precision or widen the storage.
    #[error("Precision overflow: {0}")]
    PrecisionOverflow(String),

    /// A coordinate below the configured minimum, or not finite.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A stored reference points at a dictionary key that does not exist.
    #[error("Referential integrity violation: {tier} key {key} is missing")]
    ReferentialIntegrityViolation {
        /// Dictionary tier the key was looked up in
        tier: &'static str,
        /// The dangling key
        key: DictionaryKey,
    },

    /// No snapshot stored for the requested timestamp.
    #[error("Not found: no document for timestamp {0}")]
    NotFound(String),

    /// Two distinct attribute groups produced the same truncated digest.
    #[error("Hash collision in {tier} tier on key {key}")]
    HashCollision {
        /// Dictionary tier the collision happened in
        tier: &'static str,
        /// The colliding key
        key: DictionaryKey,
    },

    /// A document with this timestamp was already stored.
    #[error("Duplicate timestamp: {0}")]
    DuplicateTimestamp(String),

    /// Malformed wire data
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A commit frame failed its checksum before the end of the segment.
    #[error("Corrupt segment {} at offset {offset}", .path.display())]
    CorruptSegment {
        /// Segment file
        path: PathBuf,
        /// Byte offset of the bad frame
        offset: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure of the underlying storage
    #[error("Backend error: {0}")]
    Backend(#[from] std::io::Error),

    /// Binary encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
