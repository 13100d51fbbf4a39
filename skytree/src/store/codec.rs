//! Block framing: `[u32 little-endian length][bincode payload]`.
//!
//! Encoding uses `bincode::config::legacy()`, whose fixed-width integers make
//! the encoded size of a value independent of its contents.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{IndexError, IndexResult};

/// Bytes taken by the length prefix of every frame.
pub const LENGTH_PREFIX: usize = 4;

/// Encodes `value` into a length-prefixed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> IndexResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(value, bincode::config::legacy())?;
    let length = u32::try_from(body.len()).map_err(|_| {
        IndexError::Serialization(format!("frame of {} bytes is too large", body.len()))
    })?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX + body.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Size of the frame [`encode_frame`] would produce for `value`.
pub fn framed_len<T: Serialize>(value: &T) -> IndexResult<usize> {
    let body = bincode::serde::encode_to_vec(value, bincode::config::legacy())?;
    Ok(LENGTH_PREFIX + body.len())
}

/// Decodes a frame read back from a block. Trailing padding is ignored.
///
/// Malformed frames are reported as [`IndexError::CorruptIndex`] since the
/// bytes come straight from storage.
pub fn decode_frame<T: DeserializeOwned>(block: &[u8]) -> IndexResult<T> {
    if block.len() < LENGTH_PREFIX {
        return Err(IndexError::CorruptIndex(format!(
            "block of {} bytes has no length prefix",
            block.len()
        )));
    }
    let (prefix, rest) = block.split_at(LENGTH_PREFIX);
    let length = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if length == 0 || length > rest.len() {
        return Err(IndexError::CorruptIndex(format!(
            "frame length {} does not fit a block of {} bytes",
            length,
            block.len()
        )));
    }
    bincode::serde::decode_from_slice(&rest[..length], bincode::config::legacy())
        .map(|(value, _)| value)
        .map_err(|e| IndexError::CorruptIndex(format!("undecodable block: {e}")))
}
