//! FPK archive operations module

pub mod reader;
pub mod types;
pub mod writer;

// Primary public API
pub use reader::{extract_fpk, list_fpk, ExtractOptions, FpkReader, ProgressCallback};
pub use writer::{pack_fpk, FpkWriter, PackOptions};

// Re-export the wire-level types
pub use types::{name_hash, FpkEntry, FpkPhase, FpkProgress, FpkTrailer, FpkVersion};
