use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use super::error::{MegaError, Result};
use super::structures::{MegaFileEntry, MegaIndex, PackageBlock, PackageHeader};
use super::varint::{read_compact_int, read_package_string};
use crate::io::ReadAt;

/// Refill granularity for the metadata window.
const CURSOR_CHUNK: usize = 64 * 1024;

/// Buffered sequential reader over a random-access source.
///
/// The metadata prologue is a plain byte stream, so this keeps a sliding
/// window over the source and hands out bytes in order while tracking the
/// absolute position that eventually becomes the data origin.
pub(crate) struct StreamCursor<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
    pos: u64,
    buf: Vec<u8>,
    buf_start: u64,
}

impl<R: ReadAt> StreamCursor<R> {
    pub(crate) fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            pos: 0,
            buf: Vec::new(),
            buf_start: 0,
        }
    }

    /// Absolute offset of the next unread byte.
    pub(crate) fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left between the position and the end of the source.
    pub(crate) fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }

    pub(crate) async fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte).await?;
        Ok(byte[0])
    }

    pub(crate) async fn read_i32_le(&mut self) -> Result<i32> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw).await?;
        Ok(i32::from_le_bytes(raw))
    }

    /// Fill `out` completely or report exactly how much was missing.
    pub(crate) async fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        if out.len() as u64 > self.remaining() {
            return Err(MegaError::TruncatedInput {
                offset: self.pos,
                needed: out.len() as u64,
                available: self.remaining(),
            });
        }

        let mut filled = 0;
        while filled < out.len() {
            let avail = self.buffered();
            if avail.is_empty() {
                self.refill().await?;
                continue;
            }
            let n = avail.len().min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&avail[..n]);
            filled += n;
            self.pos += n as u64;
        }
        Ok(())
    }

    /// Window bytes covering the current position, if any.
    fn buffered(&self) -> &[u8] {
        let end = self.buf_start + self.buf.len() as u64;
        if self.pos >= self.buf_start && self.pos < end {
            &self.buf[(self.pos - self.buf_start) as usize..]
        } else {
            &[]
        }
    }

    async fn refill(&mut self) -> Result<()> {
        let want = (CURSOR_CHUNK as u64).min(self.remaining());
        if want == 0 {
            return Err(MegaError::TruncatedInput {
                offset: self.pos,
                needed: 1,
                available: 0,
            });
        }
        let mut buf = vec![0u8; want as usize];
        self.reader.read_exact_at(self.pos, &mut buf).await?;
        self.buf = buf;
        self.buf_start = self.pos;
        Ok(())
    }
}

/// MegaPackage metadata parser
///
/// Reads the header, entry table, block table and compressed-size field in
/// one forward pass and records where the compressed-data region begins.
pub struct MegaParser<R: ReadAt> {
    reader: Arc<R>,
}

impl<R: ReadAt> MegaParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Parse the full metadata prologue.
    ///
    /// Counts are sanity-checked against the bytes actually left in the
    /// source before any table is allocated, so a corrupt count fails fast
    /// instead of attempting a multi-gigabyte allocation.
    pub async fn read_index(&self) -> Result<MegaIndex> {
        let mut cursor = StreamCursor::new(Arc::clone(&self.reader));

        let mut raw_header = [0u8; PackageHeader::SIZE];
        cursor.read_exact(&mut raw_header).await?;
        let header = PackageHeader::from_bytes(&raw_header)?;

        let entry_count = read_compact_int(&mut cursor).await?;
        let min_entry_bytes = MegaFileEntry::META_SIZE as u64 + 1;
        if entry_count < 0 || entry_count as u64 * min_entry_bytes > cursor.remaining() {
            return Err(MegaError::MalformedCount {
                what: "entry count",
                value: entry_count,
            });
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(read_entry(&mut cursor).await?);
        }

        let block_count = read_compact_int(&mut cursor).await?;
        if block_count < 0 || block_count as u64 * PackageBlock::SIZE as u64 > cursor.remaining() {
            return Err(MegaError::MalformedCount {
                what: "block count",
                value: block_count,
            });
        }

        let mut blocks = Vec::with_capacity(block_count as usize);
        let mut raw_block = [0u8; PackageBlock::SIZE];
        for _ in 0..block_count {
            cursor.read_exact(&mut raw_block).await?;
            blocks.push(PackageBlock::from_bytes(&raw_block)?);
        }

        let compressed_size = cursor.read_i32_le().await?;
        let origin = cursor.position();

        Ok(MegaIndex {
            header,
            entries,
            blocks,
            compressed_size,
            origin,
        })
    }
}

/// Read one entry: a length-prefixed name followed by the 20-byte record.
async fn read_entry<R: ReadAt>(cursor: &mut StreamCursor<R>) -> Result<MegaFileEntry> {
    let name = read_package_string(cursor).await?;

    let mut meta = [0u8; MegaFileEntry::META_SIZE];
    cursor.read_exact(&mut meta).await?;
    let mut fields = Cursor::new(&meta[..]);

    Ok(MegaFileEntry {
        name,
        reserved: fields.read_i32::<LittleEndian>()?,
        offset: fields.read_i32::<LittleEndian>()?,
        length: fields.read_i32::<LittleEndian>()?,
        high_date_time: fields.read_u32::<LittleEndian>()?,
        low_date_time: fields.read_u32::<LittleEndian>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::mega::encode_compact_int;
    use byteorder::WriteBytesExt;

    fn cursor_over(bytes: Vec<u8>) -> StreamCursor<MemoryReader> {
        StreamCursor::new(Arc::new(MemoryReader::new(bytes)))
    }

    fn parser_over(bytes: Vec<u8>) -> MegaParser<MemoryReader> {
        MegaParser::new(Arc::new(MemoryReader::new(bytes)))
    }

    fn push_entry(out: &mut Vec<u8>, name: &str, offset: i32, length: i32) {
        out.extend_from_slice(&encode_compact_int(name.len() as i32));
        out.extend_from_slice(name.as_bytes());
        out.write_i32::<LittleEndian>(0).unwrap();
        out.write_i32::<LittleEndian>(offset).unwrap();
        out.write_i32::<LittleEndian>(length).unwrap();
        out.write_u32::<LittleEndian>(0x01d2_3456).unwrap();
        out.write_u32::<LittleEndian>(0x789a_bcde).unwrap();
    }

    #[tokio::test]
    async fn cursor_tracks_position_and_remaining() {
        let mut cursor = cursor_over((0u8..10).collect());
        let mut head = [0u8; 3];
        cursor.read_exact(&mut head).await.unwrap();
        assert_eq!(head, [0, 1, 2]);
        assert_eq!(cursor.read_i32_le().await.unwrap(), i32::from_le_bytes([3, 4, 5, 6]));
        assert_eq!(cursor.position(), 7);
        assert_eq!(cursor.remaining(), 3);
    }

    #[tokio::test]
    async fn cursor_reads_across_refills() {
        let data: Vec<u8> = (0..100_000).map(|i| (i % 251) as u8).collect();
        let mut cursor = cursor_over(data.clone());
        let mut out = vec![0u8; 70_000];
        cursor.read_exact(&mut out).await.unwrap();
        assert_eq!(out, data[..70_000]);
        assert_eq!(cursor.position(), 70_000);
    }

    #[tokio::test]
    async fn cursor_reports_shortfall() {
        let mut cursor = cursor_over(vec![1, 2, 3]);
        let mut out = [0u8; 8];
        let err = cursor.read_exact(&mut out).await.unwrap_err();
        match err {
            MegaError::TruncatedInput {
                offset,
                needed,
                available,
            } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 8);
                assert_eq!(available, 3);
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parses_empty_package() {
        let mut bytes = b"AGEM\x01\x00\x00\x00".to_vec();
        bytes.push(0x00); // no entries
        bytes.push(0x00); // no blocks
        bytes.write_i32::<LittleEndian>(0).unwrap();

        let index = parser_over(bytes.clone()).read_index().await.unwrap();
        assert_eq!(index.header.version, 1);
        assert!(index.entries.is_empty());
        assert!(index.blocks.is_empty());
        assert_eq!(index.compressed_size, 0);
        assert_eq!(index.origin, bytes.len() as u64);
        assert_eq!(index.payload_size(), 0);
    }

    #[tokio::test]
    async fn parses_entry_and_block_tables() {
        let mut bytes = b"AGEM\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&encode_compact_int(2));
        push_entry(&mut bytes, "Engine.U", 0, 4_000);
        push_entry(&mut bytes, "boom.DFX", 4_000, 192);
        bytes.extend_from_slice(&encode_compact_int(2));
        for (offset, length) in [(0i32, 64u16), (64, 80)] {
            bytes.write_i32::<LittleEndian>(offset).unwrap();
            bytes.write_u16::<LittleEndian>(length).unwrap();
        }
        bytes.write_i32::<LittleEndian>(144).unwrap();
        let origin = bytes.len() as u64;
        bytes.extend_from_slice(&[0xEE; 144]);

        let index = parser_over(bytes).read_index().await.unwrap();
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[0].name, "Engine.U");
        assert_eq!(index.entries[0].length, 4_000);
        assert_eq!(index.entries[1].offset, 4_000);
        assert_eq!(index.entries[1].high_date_time, 0x01d2_3456);
        assert_eq!(index.blocks, vec![
            PackageBlock { offset: 0, length: 64 },
            PackageBlock { offset: 64, length: 80 },
        ]);
        assert_eq!(index.compressed_size, 144);
        assert_eq!(index.origin, origin);
        assert_eq!(index.payload_size(), 2 * 4096);
    }

    #[tokio::test]
    async fn rejects_truncated_header() {
        let err = parser_over(b"AGEM".to_vec()).read_index().await.unwrap_err();
        assert!(matches!(err, MegaError::TruncatedInput { offset: 0, needed: 8, available: 4 }));
    }

    #[tokio::test]
    async fn rejects_negative_entry_count() {
        let mut bytes = b"AGEM\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&encode_compact_int(-1));
        let err = parser_over(bytes).read_index().await.unwrap_err();
        assert!(matches!(
            err,
            MegaError::MalformedCount { what: "entry count", value: -1 }
        ));
    }

    #[tokio::test]
    async fn rejects_entry_count_past_the_source() {
        let mut bytes = b"AGEM\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&encode_compact_int(1_000));
        let err = parser_over(bytes).read_index().await.unwrap_err();
        assert!(matches!(
            err,
            MegaError::MalformedCount { what: "entry count", value: 1_000 }
        ));
    }

    #[tokio::test]
    async fn rejects_negative_block_count() {
        let mut bytes = b"AGEM\x01\x00\x00\x00".to_vec();
        bytes.push(0x00);
        bytes.extend_from_slice(&encode_compact_int(-2));
        let err = parser_over(bytes).read_index().await.unwrap_err();
        assert!(matches!(
            err,
            MegaError::MalformedCount { what: "block count", value: -2 }
        ));
    }
}
