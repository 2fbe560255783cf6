use clap::Subcommand;
use std::path::PathBuf;
use std::str::FromStr;

/// TOC obfuscation key, accepted in decimal or `0x`-prefixed hex
#[derive(Debug, Clone, Copy)]
pub struct KeyArg(pub u32);

impl FromStr for KeyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse(),
        };
        parsed.map(KeyArg).map_err(|_| {
            format!("Invalid key '{s}'. Use a decimal or 0x-prefixed hex 32-bit value")
        })
    }
}

pub mod create;
pub mod extract;
pub mod list;

#[derive(Subcommand)]
pub enum Commands {
    /// Extract an FPK archive
    Extract {
        /// Source FPK file
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory (defaults to the archive name without .fpk)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Worker threads (0 = all cores, 1 = no threading)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Read the 128-byte-filename TOC layout
        #[arg(long)]
        v3: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Create an FPK archive from a directory
    Create {
        /// Source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output archive (defaults to the directory name plus .fpk)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// TOC obfuscation key (decimal or 0x-prefixed hex, default 0)
        #[arg(short, long)]
        key: Option<KeyArg>,

        /// Worker threads (0 = all cores, 1 = no threading)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Store files uncompressed instead of ZLC-compressing them
        #[arg(long)]
        no_zlc: bool,

        /// Emit the 128-byte-filename TOC layout
        #[arg(long)]
        v3: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the contents of an FPK archive
    List {
        /// Source FPK file
        #[arg(short, long)]
        source: PathBuf,

        /// Show offsets, sizes and name hashes
        #[arg(short, long)]
        detailed: bool,

        /// Print only the number of entries
        #[arg(long)]
        count: bool,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Extract {
                source,
                destination,
                threads,
                v3,
                quiet,
            } => extract::execute(source, destination.as_deref(), *threads, *v3, !*quiet),
            Commands::Create {
                source,
                destination,
                key,
                threads,
                no_zlc,
                v3,
                quiet,
            } => create::execute(
                source,
                destination.as_deref(),
                key.map_or(0, |k| k.0),
                *threads,
                !*no_zlc,
                *v3,
                !*quiet,
            ),
            Commands::List {
                source,
                detailed,
                count,
            } => list::execute(source, *detailed, *count),
        }
    }
}
