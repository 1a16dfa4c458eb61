//! # runmega
//!
//! A Rust MegaPackage.dat unpacker with HTTP URL support using Range requests.
//!
//! This library reads the MegaPackage container format from both local
//! filesystem and remote HTTP servers. The whole metadata prologue sits at
//! the front of the file and every 4096-byte payload slot is rebuilt from
//! its own zlib chunk, so individual files can be pulled out of a large
//! remote package by fetching only the prologue and the few chunks their
//! byte ranges cover, without downloading the entire file.
//!
//! ## Features
//!
//! - Unpack MegaPackage.dat from the local filesystem
//! - Unpack from HTTP/HTTPS URLs using Range requests
//! - Category folders derived from entry names (Textures, Sounds, ...)
//! - Windows FILETIME modification stamps applied to unpacked files
//! - Selective extraction with glob pattern matching
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runmega::{HttpRangeReader, MegaExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Create a reader for a remote package
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/MegaPackage.dat".to_string()).await?);
//!
//!     // Create an extractor and parse the metadata prologue
//!     let extractor = MegaExtractor::new(reader);
//!     let index = extractor.read_index().await?;
//!
//!     // List all files in the package
//!     for entry in &index.entries {
//!         println!("{:>10}  {}", entry.length, entry.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod mega;

pub use cli::Cli;
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use mega::{
    MegaError, MegaExtractor, MegaFileEntry, MegaIndex, PackageBlock, PackageHeader, entry_slice,
    write_entry,
};
