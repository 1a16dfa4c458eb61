//! MegaPackage parsing and extraction.
//!
//! This module provides functionality for reading and extracting
//! MegaPackage.dat archives, the block-compressed container used by the
//! game's asset pipeline.
//!
//! ## Architecture
//!
//! The module is organized into five components:
//!
//! - [`structures`]: Data structures for the format elements (header, entry table, block table)
//! - [`varint`]: The compact signed-integer codec used by all counts and name lengths
//! - [`parser`]: One-pass parsing of the metadata prologue from a [`ReadAt`] source
//! - [`blocks`]: Zlib chunk decompression and payload reassembly
//! - [`extractor`]: High-level extraction API for end users
//!
//! ## MegaPackage Format Overview
//!
//! A package consists of:
//! 1. An 8-byte header (magic `MEGA` stored little-endian, plus a version)
//! 2. An entry table: per file, a length-prefixed name and a 20-byte record
//!    holding its payload offset, length and Windows FILETIME
//! 3. A block table of 6-byte records locating the compressed chunks
//! 4. A 4-byte compressed-size field; the stream position after it is the
//!    origin all block offsets are relative to
//! 5. The zlib-compressed chunks themselves
//!
//! Every chunk decompresses to exactly 4096 bytes and fills the payload
//! slot matching its table position, so an entry can be recovered by
//! decompressing only the blocks its byte range covers - a good match for
//! HTTP Range requests.
//!
//! ## Limitations
//!
//! - No write or repack support
//! - Only one format version is known; the header version is carried but
//!   not interpreted
//!
//! [`ReadAt`]: crate::io::ReadAt

mod blocks;
mod error;
mod extractor;
mod parser;
mod structures;
mod varint;

pub use error::{MegaError, Result};
pub use extractor::{MegaExtractor, entry_slice, write_entry};
pub use parser::MegaParser;
pub use structures::*;
pub use varint::encode_compact_int;
