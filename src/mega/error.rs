//! Error types for MegaPackage decoding.

use thiserror::Error;

/// Errors produced while decoding a MegaPackage archive.
///
/// Every decode error is terminal for the current run: the decoder stops at
/// the first failure and performs no partial-output recovery.
#[derive(Debug, Error)]
pub enum MegaError {
    /// The 8-byte header does not carry the MegaPackage magic.
    #[error("not a MegaPackage: bad magic {found:#010x}")]
    InvalidHeader { found: u32 },

    /// A count field (entry count, block count, name length) is negative or
    /// larger than the remaining stream could possibly hold.
    #[error("malformed {what}: {value}")]
    MalformedCount { what: &'static str, value: i32 },

    /// The stream ended before the bytes a table structure promised.
    #[error("truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedInput {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// A compressed block could not be located or did not yield a full
    /// 4096-byte payload slot.
    #[error("block {index}: {reason}")]
    Decompression { index: usize, reason: String },

    /// An entry's byte range does not fit inside the reassembled payload.
    #[error(
        "entry '{name}': range {offset}+{length} exceeds payload of {payload_size} bytes"
    )]
    OutOfRange {
        name: String,
        offset: i32,
        length: i32,
        payload_size: usize,
    },

    /// An error originating from filesystem I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure reported by the underlying byte source (e.g. HTTP).
    #[error("source error: {0:#}")]
    Source(anyhow::Error),
}

impl From<anyhow::Error> for MegaError {
    fn from(err: anyhow::Error) -> Self {
        MegaError::Source(err)
    }
}

/// Convenience `Result` alias for decoder operations.
pub type Result<T> = std::result::Result<T, MegaError>;
