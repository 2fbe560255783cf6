//! Error types for `fpktool`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `fpktool` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Codec Errors ====================
    /// RLE0 is a decode-only legacy format; encoding is deliberately
    /// unsupported.
    #[error("RLE0 compression is not implemented")]
    RleCompressionUnsupported,

    /// Strict-mode decode rejected a stream whose magic bytes do not match.
    #[error("invalid {codec} magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Codec name ("ZLC" or "RLE0").
        codec: &'static str,
        /// The expected magic bytes.
        expected: [u8; 4],
        /// The bytes actually found at the start of the stream.
        found: [u8; 4],
    },

    // ==================== Pipeline Errors ====================
    /// The pipeline was started while already running.
    #[error("compression pipeline is already busy")]
    PipelineBusy,

    // ==================== FPK Archive Errors ====================
    /// The archive ends before the expected table of contents or trailer.
    #[error("truncated FPK archive: {context}")]
    TruncatedArchive {
        /// What was being read when the archive ran out.
        context: &'static str,
    },

    /// A filename does not fit the fixed-width TOC field.
    #[error("filename \"{name}\" too long, maximum length: {max}")]
    FilenameTooLong {
        /// The offending filename.
        name: String,
        /// Maximum length in bytes, excluding the terminating NUL.
        max: usize,
    },

    /// A stored file exceeds the archive's 32-bit size fields.
    #[error("file {name} is too large: {size} bytes")]
    FileTooLarge {
        /// The offending filename.
        name: String,
        /// The size that overflowed.
        size: usize,
    },

    /// The archive body outgrew the 32-bit offsets the TOC can address.
    #[error("archive too large: {size} bytes exceeds 32-bit offsets")]
    ArchiveTooLarge {
        /// The offset that overflowed.
        size: u64,
    },

    /// The archive declares more entries than its size can hold.
    #[error("FPK archive declares too many entries: {count}")]
    TooManyEntries {
        /// The declared entry count.
        count: u32,
    },

    // ==================== File System Errors ====================
    /// The pack input path does not exist.
    #[error("input path does not exist: {0}")]
    InputNotFound(PathBuf),

    /// The pack input path is not a directory.
    #[error("input path must be a directory: {0}")]
    InputNotDirectory(PathBuf),

    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `fpktool` operations.
pub type Result<T> = std::result::Result<T, Error>;
