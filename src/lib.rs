//! # fpktool
//!
//! A pure-Rust library for working with FPK game asset archives.
//!
//! ## Supported Formats
//!
//! - **FPK archives** - Extract, create, and list game asset packages,
//!   with both the plain and the obfuscated table-of-contents layouts
//! - **ZLC** - The archives' LZ77 compression (4 KiB window)
//! - **RLE0** - Legacy run-length encoding (decode only)
//!
//! ## Quick Start
//!
//! ### Working with FPK Archives
//!
//! ```no_run
//! use fpktool::fpk::{list_fpk, pack_fpk, PackOptions};
//!
//! // List contents of an FPK file
//! let entries = list_fpk("data.fpk")?;
//! println!("Found {} files", entries.len());
//!
//! // Pack a directory into an archive
//! pack_fpk("assets/", "data.fpk", PackOptions::default(), None)?;
//! # Ok::<(), fpktool::Error>(())
//! ```
//!
//! ### Compressing Buffers Directly
//!
//! ```
//! use fpktool::codec::Zlc;
//!
//! let packed = Zlc::compress(b"abcabcabcabcabc");
//! assert_eq!(Zlc::decompress(&packed), b"abcabcabcabcabc");
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `fpktool` command-line binary

pub mod codec;
pub mod error;
pub mod fpk;
pub mod pipeline;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::codec::{Codec, FpkPayloadCodec, Rle0, Zlc};
    pub use crate::error::{Error, Result};
    pub use crate::fpk::{
        extract_fpk, list_fpk, pack_fpk, ExtractOptions, FpkEntry, FpkPhase, FpkProgress,
        FpkReader, FpkVersion, FpkWriter, PackOptions,
    };
    pub use crate::pipeline::{CompressionPipeline, Direction, PipelineConfig, Task};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
