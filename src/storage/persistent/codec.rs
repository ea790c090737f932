//! Record framing for the log and snapshot files.
//!
//! Files start with a header:
//!
//! ```text
//! [magic: "CDSK"][codec version: 1 byte][file kind: 1 byte]
//! ```
//!
//! followed by frames:
//!
//! ```text
//! [codec version: 1 byte][length: 4 bytes LE][JSON payload][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

const CODEC_VERSION: u8 = 1;
const MAGIC: [u8; 4] = *b"CDSK";
/// Frames larger than this are treated as corruption.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Length of a file header in bytes.
pub const HEADER_LEN: u64 = 6;

/// What a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileKind {
    /// Append-only mutation log.
    Log = 1,
    /// Full table snapshot.
    Snapshot = 2,
}

impl FileKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Log),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

fn invalid(msg: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg)
}

/// Frames a value.
///
/// # Errors
///
/// `InvalidData` when the value cannot be serialized or is too large.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|e| invalid(format!("serialization failed: {e}")))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(invalid(format!(
            "frame of {} bytes exceeds maximum {MAX_FRAME_LEN}",
            payload.len()
        )));
    }
    let len = u32::try_from(payload.len()).map_err(|_| invalid("frame length overflow".to_string()))?;

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(payload.len() + 9);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Reads one frame and decodes its payload.
///
/// # Errors
///
/// `UnexpectedEof` when the frame is cut short (a torn tail), and
/// `InvalidData` for version, length, checksum or payload problems.
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported codec version {} (expected {CODEC_VERSION})",
            version[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(invalid(format!("frame of {len} bytes exceeds maximum {MAX_FRAME_LEN}")));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(invalid(format!(
            "checksum mismatch: stored={stored:08x} computed={computed:08x}"
        )));
    }

    serde_json::from_slice(&payload).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Writes a file header.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_header(writer: &mut impl Write, kind: FileKind) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION, kind as u8])
}

/// Reads and validates a file header, requiring `expected` kind.
///
/// # Errors
///
/// `InvalidData` for a foreign file, an unknown version or the wrong kind.
pub fn read_header(reader: &mut impl Read, expected: FileKind) -> IoResult<()> {
    let mut header = [0u8; 6];
    reader.read_exact(&mut header)?;
    if header[..4] != MAGIC {
        return Err(invalid(format!("not a coachdesk file (magic {:?})", &header[..4])));
    }
    if header[4] != CODEC_VERSION {
        return Err(invalid(format!("unsupported file version {}", header[4])));
    }
    match FileKind::from_byte(header[5]) {
        Some(kind) if kind == expected => Ok(()),
        other => Err(invalid(format!("expected {expected:?} file, found {other:?}"))),
    }
}
