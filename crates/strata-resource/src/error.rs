use thiserror::Error;

use crate::snapshot::SnapshotKind;

/// Reasons a persisted snapshot frame cannot be decoded.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame magic: expected STRA, got {actual:?}")]
    InvalidMagic { actual: Vec<u8> },

    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown snapshot kind tag: {0}")]
    UnknownKind(u8),

    #[error("snapshot kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: SnapshotKind,
        found: SnapshotKind,
    },

    #[error("frame length mismatch: header says {expected} payload bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("CRC32 mismatch: header {expected:08x}, payload {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type FrameResult<T> = Result<T, FrameError>;
