//! Main entry point for the runmega CLI application.
//!
//! This binary provides a command-line interface for unpacking MegaPackage.dat
//! archives from both local filesystem and remote HTTP URLs.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use runmega::{
    Cli, HttpRangeReader, LocalFileReader, MegaExtractor, MegaFileEntry, MegaIndex, ReadAt,
    entry_slice, write_entry,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.is_http_url() {
        // Handle remote packages via HTTP Range requests
        let reader = HttpRangeReader::new(cli.file.clone()).await?;
        let transferred_before = reader.transferred_bytes();
        let reader = Arc::new(reader);

        process_package(reader.clone(), &cli).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        // Handle local package file
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.file))?);
        process_package(reader, &cli).await?;
    }

    Ok(())
}

/// Process a MegaPackage based on CLI options.
///
/// This function handles both listing and extraction modes:
/// - List mode (`-l` or `-v`): Display package contents from the metadata
///   prologue alone, without touching the compressed data
/// - Extract mode: Extract files matching the specified filters
///
/// An unfiltered extraction rebuilds the payload once, so every block is
/// decompressed exactly once no matter how many entries share it. With
/// filters, each selected entry decompresses only the blocks its byte
/// range covers - over HTTP that means fetching just those chunks.
async fn process_package<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let extractor = MegaExtractor::new(reader);
    let index = extractor.read_index().await?;

    // List mode: display package contents and exit
    if cli.list || cli.verbose {
        list_entries(&index, cli.verbose);
        return Ok(());
    }

    // Apply filters to determine which files to extract:
    // 1. If specific files are requested, only include matching entries
    // 2. Exclude files matching the exclusion patterns
    let files_to_extract: Vec<&MegaFileEntry> = index
        .entries
        .iter()
        .filter(|e| {
            // If specific files are requested via positional arguments,
            // only include entries that match
            if !cli.files.is_empty() {
                let matches = cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        glob_match(f, &e.name)
                    } else {
                        e.name == *f
                    }
                });
                if !matches {
                    return false;
                }
            }

            // Exclude files matching the -x patterns
            if cli
                .exclude
                .iter()
                .any(|x| e.name.contains(x.as_str()) || glob_match(x, &e.name))
            {
                return false;
            }

            true
        })
        .collect();

    let unfiltered = cli.files.is_empty() && cli.exclude.is_empty();
    let payload = if unfiltered {
        Some(extractor.read_payload(&index).await?)
    } else {
        None
    };

    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for entry in &files_to_extract {
        let data = match payload.as_deref() {
            Some(buf) => entry_slice(buf, entry)?.to_vec(),
            None => extractor.extract_to_memory(&index, entry).await?,
        };
        deliver_entry(entry, &data, cli, multiple_files).await?;
    }

    Ok(())
}

/// List entries in the package.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, payload offset,
///   modification time and category, plus block/payload totals
fn list_entries(index: &MegaIndex, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>16}  {:<13}  Name",
            "Length", "Offset", "Modified", "Category"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_length = 0u64;
    for entry in &index.entries {
        if verbose {
            // FILETIMEs outside chrono's range print as a dash
            let modified = entry
                .modified_utc()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());

            println!(
                "{:>10}  {:>10}  {:>16}  {:<13}  {}",
                entry.length,
                entry.offset,
                modified,
                entry.category(),
                entry.name
            );
            total_length += entry.length.max(0) as u64;
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>43}  {} files",
            total_length,
            "",
            index.entries.len()
        );
        println!(
            "{} blocks, {} payload, {} compressed",
            index.blocks.len(),
            format_size(index.payload_size() as u64),
            format_size(index.compressed_size.max(0) as u64)
        );
    }
}

/// Deliver one extracted entry according to the CLI options.
///
/// Handles the various destinations:
/// - Pipe mode (`-p`): Write to stdout instead of a file
/// - Custom output directory (`-d`): Extract under the given root
/// - Junk paths (`-j`): Skip the category directory
/// - Overwrite control (`-n`, `-o`): Handle existing files
async fn deliver_entry(
    entry: &MegaFileEntry,
    data: &[u8],
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        use tokio::io::AsyncWriteExt;
        let mut stdout = tokio::io::stdout();
        if show_filename {
            stdout
                .write_all(format!("--- {} ---\n", entry.name).as_bytes())
                .await?;
        }
        stdout.write_all(data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let shown = if cli.junk_paths {
        PathBuf::from(&entry.name)
    } else {
        entry.relative_path()
    };
    let output_path = cli.output_root().join(&shown);

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            // -n flag: never overwrite, skip silently (unless quiet)
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            // Default behavior: skip with suggestion to use -o
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            return Ok(());
        }
        // -o flag: overwrite without prompting (fall through to extraction)
    }

    // Display extraction progress
    if !cli.is_quiet() {
        println!("  extracting: {}", shown.display());
    }

    write_entry(entry, data, &output_path).await?;

    Ok(())
}

/// Check if a pattern contains glob wildcard characters (`*` or `?`).
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// This is a basic implementation for file matching:
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.DTX", "weapon.DTX"));
/// assert!(glob_match("map?.dsm", "map1.dsm"));
/// assert!(!glob_match("*.DTX", "boom.DFX"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Recursive helper function for glob matching.
    ///
    /// Uses a simple backtracking algorithm to handle `*` wildcards.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            // Both exhausted: match successful
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                // Try matching zero characters (skip the star)
                // OR matching one character (keep the star for more)
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            // Question mark matches exactly one character
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            // Literal character match
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            // No match
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
