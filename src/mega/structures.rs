use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::error::{MegaError, Result};

/// Magic tag: the ASCII bytes 'M','E','G','A' read as a big-endian value.
/// Stored little-endian, so a package file starts with the bytes `AGEM`.
pub const MEGA_MAGIC: u32 = 0x4D45_4741;

/// Decompressed size of every block; block `i` always fills payload slot
/// `[4096 * i, 4096 * (i + 1))`.
pub const BLOCK_SIZE: usize = 4096;

/// Seconds between the Windows FILETIME epoch (1601-01-01) and the Unix epoch.
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

/// FILETIME ticks per second (100 ns resolution).
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// Fixed package header - 8 bytes
#[derive(Debug, Clone, Copy)]
pub struct PackageHeader {
    pub magic: u32,
    pub version: i32,
}

impl PackageHeader {
    pub const SIZE: usize = 8;

    /// Decode a full 8-byte header region.
    ///
    /// The magic is validated only after both fields have been consumed, so
    /// the stream is past the header either way (read-then-validate). The
    /// version is carried but not interpreted; only one version is known.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header = Self {
            magic: cursor.read_u32::<LittleEndian>()?,
            version: cursor.read_i32::<LittleEndian>()?,
        };
        if header.magic != MEGA_MAGIC {
            return Err(MegaError::InvalidHeader {
                found: header.magic,
            });
        }
        Ok(header)
    }
}

/// Compressed block descriptor - 6 bytes
///
/// `offset` is relative to the origin of the compressed-data region and may
/// appear in any order; `length` is the compressed byte count, not the
/// decompressed size (which is always [`BLOCK_SIZE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageBlock {
    pub offset: i32,
    pub length: u16,
}

impl PackageBlock {
    pub const SIZE: usize = 6;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Ok(Self {
            offset: cursor.read_i32::<LittleEndian>()?,
            length: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Parsed MegaPackage file entry
#[derive(Debug, Clone)]
pub struct MegaFileEntry {
    pub name: String,
    /// Always zero in known packages; possibly a per-entry version field.
    pub reserved: i32,
    /// Byte offset into the reassembled payload buffer.
    pub offset: i32,
    /// Byte length within the payload buffer.
    pub length: i32,
    pub high_date_time: u32,
    pub low_date_time: u32,
}

impl MegaFileEntry {
    /// Size of the fixed metadata record following the name.
    pub const META_SIZE: usize = 20;

    /// Output directory for this entry, derived from its name.
    ///
    /// Sound bank names end in `_DFX` without necessarily carrying a dot;
    /// everything else maps through the extension table, defaulting to
    /// `System` for unrecognized or missing extensions.
    pub fn category(&self) -> &'static str {
        let raw = self.name.as_bytes();
        if raw.len() >= 4 && raw[raw.len() - 4..].eq_ignore_ascii_case(b"_DFX") {
            return "Sounds";
        }

        let ext = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_uppercase());

        match ext.as_deref() {
            Some("U") => "System",
            Some("DTX") => "Textures",
            Some("DMX") => "SkinMeshes",
            Some("DFX") => "Sounds",
            Some("CVP") => "Sounds",
            Some("DSM") => "StaticMeshes",
            Some("DPS") => "Particles",
            Some("XML") => "PhysicsAssets",
            Some("DCT") => "Music/Vis",
            _ => "System",
        }
    }

    /// Path of this entry below the output root: `<category>/<name>`.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.category()).join(&self.name)
    }

    /// Combined 64-bit Windows FILETIME for this entry.
    pub fn file_time(&self) -> i64 {
        ((self.high_date_time as i64) << 32) | self.low_date_time as i64
    }

    /// Modification time as UTC, if the FILETIME is representable.
    pub fn modified_utc(&self) -> Option<DateTime<Utc>> {
        let ticks = self.file_time();
        let secs = ticks.div_euclid(FILETIME_TICKS_PER_SEC) - FILETIME_UNIX_DIFF_SECS;
        let nanos = (ticks.rem_euclid(FILETIME_TICKS_PER_SEC) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

/// Fully parsed archive metadata, held for the duration of a run.
#[derive(Debug, Clone)]
pub struct MegaIndex {
    pub header: PackageHeader,
    /// Entries in on-disk order; the order carries no relationship to blocks.
    pub entries: Vec<MegaFileEntry>,
    pub blocks: Vec<PackageBlock>,
    /// Total compressed-data length as recorded in the archive. Only the
    /// stream position after this field matters (it becomes the origin);
    /// the value is not cross-checked against the block table.
    pub compressed_size: i32,
    /// Absolute offset at which the compressed-data region begins.
    pub origin: u64,
}

impl MegaIndex {
    /// Size of the reassembled payload buffer all entry ranges index into.
    pub fn payload_size(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }
}
