use std::path::Path;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use std::sync::Arc;

use super::blocks;
use super::error::{MegaError, Result};
use super::parser::MegaParser;
use super::structures::{BLOCK_SIZE, MegaFileEntry, MegaIndex};
use crate::io::ReadAt;

/// MegaPackage extractor
pub struct MegaExtractor<R: ReadAt> {
    parser: MegaParser<R>,
}

impl<R: ReadAt> MegaExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: MegaParser::new(reader),
        }
    }

    /// Parse the metadata prologue.
    pub async fn read_index(&self) -> Result<MegaIndex> {
        self.parser.read_index().await
    }

    /// Decompress every block into the full payload buffer.
    ///
    /// Entry ranges index into this buffer, so unpacking all entries via
    /// one payload decompresses each block exactly once.
    pub async fn read_payload(&self, index: &MegaIndex) -> Result<Vec<u8>> {
        blocks::reassemble(self.parser.reader(), index.origin, &index.blocks).await
    }

    /// Extract a single entry, decompressing only the blocks its payload
    /// range actually covers. Cheaper than [`read_payload`] when a filter
    /// selects a few entries, especially over HTTP.
    ///
    /// [`read_payload`]: MegaExtractor::read_payload
    pub async fn extract_to_memory(
        &self,
        index: &MegaIndex,
        entry: &MegaFileEntry,
    ) -> Result<Vec<u8>> {
        check_entry_range(entry, index.payload_size())?;
        if entry.length == 0 {
            return Ok(Vec::new());
        }

        let offset = entry.offset as usize;
        let length = entry.length as usize;
        let first = offset / BLOCK_SIZE;
        let last = (offset + length - 1) / BLOCK_SIZE;

        let run = blocks::reassemble_range(
            self.parser.reader(),
            index.origin,
            &index.blocks,
            first..last + 1,
        )
        .await?;

        let skip = offset - first * BLOCK_SIZE;
        Ok(run[skip..skip + length].to_vec())
    }

    /// Extract one entry to a file.
    pub async fn extract_to_file(
        &self,
        index: &MegaIndex,
        entry: &MegaFileEntry,
        output_path: &Path,
    ) -> Result<()> {
        let data = self.extract_to_memory(index, entry).await?;
        write_entry(entry, &data, output_path).await
    }

    /// Extract one entry to stdout (for piping).
    pub async fn extract_to_stdout(&self, index: &MegaIndex, entry: &MegaFileEntry) -> Result<()> {
        let data = self.extract_to_memory(index, entry).await?;
        let mut out = tokio::io::stdout();
        out.write_all(&data).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Borrow an entry's bytes out of a fully reassembled payload.
pub fn entry_slice<'a>(payload: &'a [u8], entry: &MegaFileEntry) -> Result<&'a [u8]> {
    check_entry_range(entry, payload.len())?;
    let start = entry.offset as usize;
    Ok(&payload[start..start + entry.length as usize])
}

/// Write extracted bytes to `path`, creating parent directories and
/// stamping the entry's recorded modification time when it converts.
pub async fn write_entry(entry: &MegaFileEntry, data: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    if let Some(modified) = entry.modified_utc() {
        let file = file.into_std().await;
        file.set_modified(SystemTime::from(modified))?;
    }
    Ok(())
}

/// An entry range must sit inside the payload; a zero-length range at the
/// very end is still valid.
fn check_entry_range(entry: &MegaFileEntry, payload_size: usize) -> Result<()> {
    let offset = entry.offset as i64;
    let length = entry.length as i64;
    if offset < 0 || length < 0 || offset + length > payload_size as i64 {
        return Err(MegaError::OutOfRange {
            name: entry.name.clone(),
            offset: entry.offset,
            length: entry.length,
            payload_size,
        });
    }
    Ok(())
}
