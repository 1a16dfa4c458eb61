use flate2::read::ZlibDecoder;
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

use super::error::{MegaError, Result};
use super::structures::{BLOCK_SIZE, PackageBlock};
use crate::io::ReadAt;

/// Rebuild the full decompressed payload from every block in the table.
pub(crate) async fn reassemble<R: ReadAt>(
    reader: &Arc<R>,
    origin: u64,
    blocks: &[PackageBlock],
) -> Result<Vec<u8>> {
    reassemble_range(reader, origin, blocks, 0..blocks.len()).await
}

/// Rebuild a contiguous run of payload slots.
///
/// Block `i` always fills slot `i` of the output regardless of where its
/// compressed bytes sit in the source, so callers can decompress only the
/// slots an entry actually touches. `range` must lie within the table.
pub(crate) async fn reassemble_range<R: ReadAt>(
    reader: &Arc<R>,
    origin: u64,
    blocks: &[PackageBlock],
    range: Range<usize>,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; range.len() * BLOCK_SIZE];
    for (slot, index) in out.chunks_exact_mut(BLOCK_SIZE).zip(range) {
        decompress_block(reader, origin, index, &blocks[index], slot).await?;
    }
    Ok(out)
}

/// Inflate one compressed chunk into its 4096-byte slot.
///
/// A chunk that inflates to more than the slot has the excess discarded;
/// one that inflates to less is an error, since every entry range assumes
/// fully populated slots.
async fn decompress_block<R: ReadAt>(
    reader: &Arc<R>,
    origin: u64,
    index: usize,
    block: &PackageBlock,
    slot: &mut [u8],
) -> Result<()> {
    let start = origin
        .checked_add_signed(block.offset as i64)
        .ok_or_else(|| MegaError::Decompression {
            index,
            reason: format!("chunk offset {} lies before the start of the source", block.offset),
        })?;

    let length = block.length as u64;
    if start.saturating_add(length) > reader.size() {
        return Err(MegaError::TruncatedInput {
            offset: start,
            needed: length,
            available: reader.size().saturating_sub(start),
        });
    }

    let mut chunk = vec![0u8; block.length as usize];
    reader.read_exact_at(start, &mut chunk).await?;

    let mut decoder = ZlibDecoder::new(chunk.as_slice());
    decoder.read_exact(slot).map_err(|e| {
        let reason = if e.kind() == std::io::ErrorKind::UnexpectedEof {
            format!("decompressed chunk shorter than {BLOCK_SIZE} bytes")
        } else {
            e.to_string()
        };
        MegaError::Decompression { index, reason }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Junk prologue so chunk offsets are exercised relative to a nonzero
    /// origin.
    const ORIGIN: u64 = 10;

    fn source_with(chunks: &[&[u8]]) -> Arc<MemoryReader> {
        let mut data = vec![0x5A; ORIGIN as usize];
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        Arc::new(MemoryReader::new(data))
    }

    fn block(offset: i32, chunk: &[u8]) -> PackageBlock {
        PackageBlock {
            offset,
            length: chunk.len() as u16,
        }
    }

    #[tokio::test]
    async fn reassembles_blocks_into_slots() {
        let z0 = zlib(&[0xAA; BLOCK_SIZE]);
        let z1 = zlib(&[0xBB; BLOCK_SIZE]);
        let reader = source_with(&[&z0, &z1]);
        let blocks = [block(0, &z0), block(z0.len() as i32, &z1)];

        let payload = reassemble(&reader, ORIGIN, &blocks).await.unwrap();
        assert_eq!(payload.len(), 2 * BLOCK_SIZE);
        assert!(payload[..BLOCK_SIZE].iter().all(|&b| b == 0xAA));
        assert!(payload[BLOCK_SIZE..].iter().all(|&b| b == 0xBB));
    }

    #[tokio::test]
    async fn block_order_in_the_source_does_not_matter() {
        let z0 = zlib(&[0xAA; BLOCK_SIZE]);
        let z1 = zlib(&[0xBB; BLOCK_SIZE]);
        // Block 1's bytes stored first; slot order must still hold.
        let reader = source_with(&[&z1, &z0]);
        let blocks = [block(z1.len() as i32, &z0), block(0, &z1)];

        let payload = reassemble(&reader, ORIGIN, &blocks).await.unwrap();
        assert!(payload[..BLOCK_SIZE].iter().all(|&b| b == 0xAA));
        assert!(payload[BLOCK_SIZE..].iter().all(|&b| b == 0xBB));
    }

    #[tokio::test]
    async fn range_reassembly_skips_unneeded_blocks() {
        let z0 = zlib(&[0xAA; BLOCK_SIZE]);
        let z1 = zlib(&[0xBB; BLOCK_SIZE]);
        let reader = source_with(&[&z0, &z1]);
        let blocks = [block(0, &z0), block(z0.len() as i32, &z1)];

        let tail = reassemble_range(&reader, ORIGIN, &blocks, 1..2).await.unwrap();
        assert_eq!(tail.len(), BLOCK_SIZE);
        assert!(tail.iter().all(|&b| b == 0xBB));
    }

    #[tokio::test]
    async fn oversized_chunks_are_truncated_to_the_slot() {
        let mut big = vec![0xCC; BLOCK_SIZE];
        big.extend_from_slice(&[0xDD; 900]);
        let z = zlib(&big);
        let reader = source_with(&[&z]);

        let payload = reassemble(&reader, ORIGIN, &[block(0, &z)]).await.unwrap();
        assert_eq!(payload.len(), BLOCK_SIZE);
        assert!(payload.iter().all(|&b| b == 0xCC));
    }

    #[tokio::test]
    async fn short_chunks_are_rejected() {
        let z = zlib(&[0xEE; 100]);
        let reader = source_with(&[&z]);

        let err = reassemble(&reader, ORIGIN, &[block(0, &z)]).await.unwrap_err();
        match err {
            MegaError::Decompression { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("shorter than"), "reason: {reason}");
            }
            other => panic!("expected Decompression, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_chunks_name_the_block() {
        let garbage = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let z1 = zlib(&[0xBB; BLOCK_SIZE]);
        let reader = source_with(&[&garbage, &z1]);
        let blocks = [block(0, &garbage), block(garbage.len() as i32, &z1)];

        let err = reassemble(&reader, ORIGIN, &blocks).await.unwrap_err();
        assert!(matches!(err, MegaError::Decompression { index: 0, .. }));
    }

    #[tokio::test]
    async fn chunks_before_the_source_are_rejected() {
        let z = zlib(&[0xAA; BLOCK_SIZE]);
        let reader = source_with(&[&z]);
        let before_start = -(ORIGIN as i32) - 1;

        let err = reassemble(&reader, ORIGIN, &[block(before_start, &z)])
            .await
            .unwrap_err();
        assert!(matches!(err, MegaError::Decompression { index: 0, .. }));
    }

    #[tokio::test]
    async fn chunks_past_the_source_are_rejected() {
        let z = zlib(&[0xAA; BLOCK_SIZE]);
        let reader = source_with(&[&z[..z.len() - 4]]);

        let err = reassemble(&reader, ORIGIN, &[block(0, &z)]).await.unwrap_err();
        assert!(matches!(err, MegaError::TruncatedInput { .. }));
    }
}
