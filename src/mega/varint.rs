//! Compact signed-integer codec used throughout the metadata prologue.
//!
//! The first byte carries a sign bit (7), a continuation bit (6) and the
//! six low value bits. Continuation bytes carry a continuation bit (7)
//! and seven value bits, spliced in at shifts 6, 13, 20 and 27. The shift
//! cap is checked before each continuation byte is consumed, so an
//! over-long sequence stops after five bytes and leaves the rest of the
//! stream unread; bits shifted past bit 31 are discarded. A set sign bit
//! applies two's-complement negation at the end, which maps a sign with
//! zero magnitude to plain zero and keeps `i32::MIN` representable.

use super::error::{MegaError, Result};
use super::parser::StreamCursor;
use crate::io::ReadAt;

pub(crate) async fn read_compact_int<R: ReadAt>(cursor: &mut StreamCursor<R>) -> Result<i32> {
    let first = cursor.read_u8().await?;
    let negative = first & 0x80 != 0;
    let mut value = (first & 0x3F) as i32;

    if first & 0x40 != 0 {
        let mut shift = 6u32;
        loop {
            if shift > 27 {
                break;
            }
            let byte = cursor.read_u8().await?;
            value |= ((byte & 0x7F) as i32) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
    }

    if negative {
        Ok(value.wrapping_neg())
    } else {
        Ok(value)
    }
}

/// Read a length-prefixed name record: a compact-int byte count followed
/// by the raw bytes. The stored name is truncated at the first nul and
/// decoded lossily, so an undecodable byte never aborts a listing.
pub(crate) async fn read_package_string<R: ReadAt>(
    cursor: &mut StreamCursor<R>,
) -> Result<String> {
    let len = read_compact_int(cursor).await?;
    if len < 0 {
        return Err(MegaError::MalformedCount {
            what: "name length",
            value: len,
        });
    }
    if len as u64 > cursor.remaining() {
        return Err(MegaError::TruncatedInput {
            offset: cursor.position(),
            needed: len as u64,
            available: cursor.remaining(),
        });
    }

    let mut raw = vec![0u8; len as usize];
    cursor.read_exact(&mut raw).await?;
    if let Some(nul) = raw.iter().position(|&b| b == 0) {
        raw.truncate(nul);
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Encode a value in the compact format. Exact inverse of the reader for
/// every `i32` including `i32::MIN`; used to build packages in tests.
pub fn encode_compact_int(value: i32) -> Vec<u8> {
    let negative = value < 0;
    let mut magnitude = (value as i64).unsigned_abs();

    let mut first = (magnitude & 0x3F) as u8;
    if negative {
        first |= 0x80;
    }
    magnitude >>= 6;
    if magnitude != 0 {
        first |= 0x40;
    }

    let mut out = vec![first];
    while magnitude != 0 {
        let mut byte = (magnitude & 0x7F) as u8;
        magnitude >>= 7;
        if magnitude != 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}
