//! Binary wire format for TuskStore WAL records
//!
//! Records are laid out little-endian with no framing beyond the header
//! fields themselves:
//!
//! ```text
//! [0]      op code:        u8  — 1=PUT, 2=DEL
//! [1..5]   key length:     u32
//! [5..9]   payload length: u32 — only when op=PUT
//! [..]     key bytes
//! [..]     payload bytes        — only when op=PUT
//! ```
//!
//! A header whose lengths fall outside the fixed bounds is corruption; a
//! record that runs past the end of the buffer is a torn write and marks
//! the recovery stop point.

use std::path::Path;

use crate::error::{TuskError, TuskResult};

/// Maximum key size in bytes (1MB)
pub const MAX_KEY_SIZE: usize = 1024 * 1024;

/// Maximum payload size in bytes (100MB)
pub const MAX_PAYLOAD_SIZE: usize = 100 * 1024 * 1024;

/// WAL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalOp {
    /// Insert or update a key's payload
    Put = 1,
    /// Delete a key
    Del = 2,
}

/// A decoded WAL record. `payload` is empty for DEL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub op: WalOp,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Outcome of decoding one record out of a buffer.
#[derive(Debug)]
pub enum Decoded {
    /// A complete record; `next` is the offset of the following record
    Record { record: WalRecord, next: usize },
    /// The buffer ends mid-record — the torn tail of a crashed append
    Torn,
}

/// Serialize a PUT record.
///
/// Sizes are validated BEFORE any allocation so an oversized write can
/// never reach the log and poison later recovery.
pub fn encode_put(key: &[u8], payload: &[u8]) -> TuskResult<Vec<u8>> {
    validate_key(key)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(TuskError::OversizedRecord {
            size: payload.len() as u64,
            max: MAX_PAYLOAD_SIZE as u64,
            component: "value",
        });
    }

    let mut buf = Vec::with_capacity(1 + 4 + 4 + key.len() + payload.len());
    buf.push(WalOp::Put as u8);
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Serialize a DEL record.
pub fn encode_del(key: &[u8]) -> TuskResult<Vec<u8>> {
    validate_key(key)?;

    let mut buf = Vec::with_capacity(1 + 4 + key.len());
    buf.push(WalOp::Del as u8);
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    Ok(buf)
}

fn validate_key(key: &[u8]) -> TuskResult<()> {
    if key.is_empty() {
        return Err(TuskError::InvalidKey);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(TuskError::OversizedRecord {
            size: key.len() as u64,
            max: MAX_KEY_SIZE as u64,
            component: "key",
        });
    }
    Ok(())
}

/// Decode the record starting at `offset`.
///
/// Returns `Decoded::Torn` when the buffer ends before the record does —
/// the caller stops recovery there. A header with an invalid op code or
/// out-of-range lengths is `WalCorrupted` and aborts recovery; `path` is
/// only used for error context.
pub fn decode_at(buf: &[u8], offset: usize, path: &Path) -> TuskResult<Decoded> {
    let remaining = &buf[offset..];
    if remaining.is_empty() {
        return Ok(Decoded::Torn);
    }

    let op = match remaining[0] {
        1 => WalOp::Put,
        2 => WalOp::Del,
        other => {
            return Err(TuskError::WalCorrupted {
                path: path.to_path_buf(),
                offset: offset as u64,
                reason: format!("invalid op code: {}", other),
            });
        }
    };

    if remaining.len() < 5 {
        return Ok(Decoded::Torn);
    }
    let klen = u32::from_le_bytes([remaining[1], remaining[2], remaining[3], remaining[4]]) as usize;
    if klen == 0 || klen > MAX_KEY_SIZE {
        return Err(TuskError::WalCorrupted {
            path: path.to_path_buf(),
            offset: offset as u64,
            reason: format!("invalid key length: {}", klen),
        });
    }

    let (vlen, body_start) = match op {
        WalOp::Put => {
            if remaining.len() < 9 {
                return Ok(Decoded::Torn);
            }
            let vlen =
                u32::from_le_bytes([remaining[5], remaining[6], remaining[7], remaining[8]])
                    as usize;
            if vlen > MAX_PAYLOAD_SIZE {
                return Err(TuskError::WalCorrupted {
                    path: path.to_path_buf(),
                    offset: offset as u64,
                    reason: format!("payload length too large: {}", vlen),
                });
            }
            (vlen, 9)
        }
        WalOp::Del => (0, 5),
    };

    let total = body_start + klen + vlen;
    if remaining.len() < total {
        return Ok(Decoded::Torn);
    }

    let key = remaining[body_start..body_start + klen].to_vec();
    let payload = remaining[body_start + klen..total].to_vec();

    Ok(Decoded::Record {
        record: WalRecord { op, key, payload },
        next: offset + total,
    })
}
