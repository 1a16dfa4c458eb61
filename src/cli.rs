use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "runmega")]
#[command(version)]
#[command(about = "A Rust MegaPackage.dat unpacker with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  runmega Packages/MegaPackage.dat       unpack everything into category folders\n  \
  runmega MegaPackage.dat '*.DTX' -o     extract all textures, overwriting\n  \
  runmega -p MegaPackage.dat Engine.U | xxd   send one file via pipe into xxd\n  \
  runmega -l https://example.com/MegaPackage.dat   list files from a remote package")]
pub struct Cli {
    /// MegaPackage file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (sizes, timestamps, categories)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir instead of the package's parent directory
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make category directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    /// Directory the category folders are created under.
    ///
    /// A MegaPackage conventionally lives in a `Packages` subdirectory of
    /// the game root, and assets unpack next to `Packages`, not into it.
    /// Without `-d` the root is therefore the grandparent of the package
    /// file, falling back to the current directory for bare file names and
    /// URLs.
    pub fn output_root(&self) -> PathBuf {
        if let Some(ref dir) = self.extract_dir {
            return PathBuf::from(dir);
        }
        if self.is_http_url() {
            return PathBuf::from(".");
        }
        Path::new(&self.file)
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
