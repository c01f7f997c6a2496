//! Snapshot frame codec.
//!
//! Every persisted resource is a single frame:
//!
//! ```text
//! [4 bytes: magic "STRA"]
//! [1 byte : format version]
//! [1 byte : snapshot kind tag]
//! [1 byte : flags (bit 0 = zstd-compressed payload)]
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload as stored (little-endian u32)]
//! [N bytes: payload (bincode-serialized snapshot, optionally zstd)]
//! ```

use serde::Serialize;

use crate::error::{FrameError, FrameResult};
use crate::snapshot::{Snapshot, SnapshotKind};

pub const MAGIC: &[u8; 4] = b"STRA";
pub const FORMAT_VERSION: u8 = 1;
/// Magic + version + kind + flags + length + CRC.
pub const HEADER_LEN: usize = 15;

const FLAG_ZSTD: u8 = 0b0000_0001;

/// Payload compression applied on save. Decoding follows the frame flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    /// zstd at the given level.
    Zstd(i32),
}

/// Decoded frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub version: u8,
    pub kind: SnapshotKind,
    pub compressed: bool,
    pub payload_len: u32,
    pub crc32: u32,
}

impl FrameHeader {
    /// Size of the whole frame in bytes.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

/// Serialize `snapshot` into a frame.
pub fn encode<S: Snapshot>(snapshot: &S, compression: Compression) -> FrameResult<Vec<u8>> {
    let raw = bincode::serialize(snapshot).map_err(|e| FrameError::Serialization(e.to_string()))?;
    let (payload, flags) = match compression {
        Compression::None => (raw, 0),
        Compression::Zstd(level) => {
            let compressed = zstd::encode_all(raw.as_slice(), level)
                .map_err(|e| FrameError::Compression(e.to_string()))?;
            (compressed, FLAG_ZSTD)
        }
    };
    let len = u32::try_from(payload.len()).map_err(|_| {
        FrameError::Serialization(format!("payload of {} bytes exceeds u32", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(MAGIC);
    frame.push(FORMAT_VERSION);
    frame.push(S::KIND.tag());
    frame.push(flags);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a frame holding a snapshot of type `S`.
pub fn decode<S: Snapshot>(bytes: &[u8]) -> FrameResult<S> {
    let header = inspect(bytes)?;
    if header.kind != S::KIND {
        return Err(FrameError::KindMismatch {
            expected: S::KIND,
            found: header.kind,
        });
    }
    let payload = &bytes[HEADER_LEN..];
    let raw = if header.compressed {
        zstd::decode_all(payload).map_err(|e| FrameError::Decompression(e.to_string()))?
    } else {
        payload.to_vec()
    };
    bincode::deserialize(&raw).map_err(|e| FrameError::Serialization(e.to_string()))
}

/// Parse the header and verify length and checksum without decoding the
/// payload.
pub fn inspect(bytes: &[u8]) -> FrameResult<FrameHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::LengthMismatch {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(FrameError::InvalidMagic {
            actual: bytes[0..4].to_vec(),
        });
    }
    let version = bytes[4];
    if version != FORMAT_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    let kind = SnapshotKind::from_tag(bytes[5]).ok_or(FrameError::UnknownKind(bytes[5]))?;
    let flags = bytes[6];
    let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
    let crc32 = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);

    let payload = &bytes[HEADER_LEN..];
    if payload.len() != payload_len as usize {
        return Err(FrameError::LengthMismatch {
            expected: payload_len as usize,
            actual: payload.len(),
        });
    }
    let actual = crc32fast::hash(payload);
    if actual != crc32 {
        return Err(FrameError::CrcMismatch {
            expected: crc32,
            actual,
        });
    }

    Ok(FrameHeader {
        version,
        kind,
        compressed: flags & FLAG_ZSTD != 0,
        payload_len,
        crc32,
    })
}
