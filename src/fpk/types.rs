//! Types for FPK archive handling

/// Entry-count flag bit marking an obfuscated, trailer-addressed TOC.
pub const OBFUSCATED_FLAG: u32 = 0x80000000;

/// Size of the end-of-file trailer: key + TOC offset.
pub const TRAILER_SIZE: usize = 8;

/// Size of a plain (non-obfuscated) TOC record.
pub const PLAIN_ENTRY_SIZE: usize = 32;

/// Filename field width of a plain TOC record.
pub const PLAIN_FILENAME_LEN: usize = 24;

/// Archive version, which fixes the obfuscated TOC record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FpkVersion {
    /// 24-byte filename field.
    #[default]
    V2,
    /// 128-byte filename field.
    V3,
}

impl FpkVersion {
    /// Filename field width in bytes (including the terminating NUL).
    #[must_use]
    pub fn filename_len(self) -> usize {
        match self {
            FpkVersion::V2 => 24,
            FpkVersion::V3 => 128,
        }
    }

    /// Size of one obfuscated TOC record: offset + length + filename + hash.
    #[must_use]
    pub fn entry_size(self) -> usize {
        self.filename_len() + 12
    }
}

/// One table-of-contents entry.
///
/// `(offset, length)` address the raw stored payload in the archive body;
/// the payload is the RLE0-then-ZLC encoded form of the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpkEntry {
    /// Byte offset of the stored payload from the start of the archive.
    pub offset: u32,
    /// Stored payload length in bytes.
    pub length: u32,
    /// Filename, NUL-trimmed.
    pub filename: String,
    /// [`name_hash`] of the filename; the TOC is sorted by this value.
    pub hash: u32,
}

impl FpkEntry {
    /// Build an entry for a freshly written payload.
    #[must_use]
    pub fn new(offset: u32, length: u32, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let hash = name_hash(&filename);
        Self {
            offset,
            length,
            filename,
            hash,
        }
    }

    /// Serialize into an obfuscated-variant record of the version's width.
    #[must_use]
    pub fn to_record(&self, version: FpkVersion) -> Vec<u8> {
        let mut record = Vec::with_capacity(version.entry_size());
        record.extend_from_slice(&self.offset.to_le_bytes());
        record.extend_from_slice(&self.length.to_le_bytes());
        push_name_field(&mut record, &self.filename, version.filename_len());
        record.extend_from_slice(&self.hash.to_le_bytes());
        record
    }

    /// Parse an obfuscated-variant record. `bytes` must be exactly
    /// `version.entry_size()` long.
    #[must_use]
    pub fn from_record(bytes: &[u8], version: FpkVersion) -> Self {
        let name_len = version.filename_len();
        let offset = read_u32(bytes, 0);
        let length = read_u32(bytes, 4);
        let filename = parse_name_field(&bytes[8..8 + name_len]);
        let hash = read_u32(bytes, 8 + name_len);
        Self {
            offset,
            length,
            filename,
            hash,
        }
    }

    /// Serialize into the plain-variant 32-byte record (no hash field).
    #[must_use]
    pub fn to_plain_record(&self) -> Vec<u8> {
        let mut record = Vec::with_capacity(PLAIN_ENTRY_SIZE);
        record.extend_from_slice(&self.offset.to_le_bytes());
        record.extend_from_slice(&self.length.to_le_bytes());
        push_name_field(&mut record, &self.filename, PLAIN_FILENAME_LEN);
        record
    }

    /// Parse a plain-variant 32-byte record.
    #[must_use]
    pub fn from_plain_record(bytes: &[u8]) -> Self {
        let offset = read_u32(bytes, 0);
        let length = read_u32(bytes, 4);
        let filename = parse_name_field(&bytes[8..8 + PLAIN_FILENAME_LEN]);
        let hash = name_hash(&filename);
        Self {
            offset,
            length,
            filename,
            hash,
        }
    }
}

/// End-of-file trailer of the obfuscated TOC variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpkTrailer {
    /// XOR obfuscation key applied to the TOC records.
    pub key: u32,
    /// Byte offset of the first TOC record.
    pub toc_offset: u32,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn push_name_field(record: &mut Vec<u8>, name: &str, width: usize) {
    let start = record.len();
    let bytes = name.as_bytes();
    // always leaves at least the terminating NUL
    let n = bytes.len().min(width - 1);
    record.extend_from_slice(&bytes[..n]);
    record.resize(start + width, 0);
}

fn parse_name_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Filename hash used to order the TOC.
///
/// A wrapping 16-bit sum of `uppercase(byte) * index` with 1-based indices,
/// widened to 32 bits for storage.
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    let mut hash: u16 = 0;
    for (i, byte) in name.bytes().enumerate() {
        let c = u16::from(byte.to_ascii_uppercase());
        hash = hash.wrapping_add(c.wrapping_mul(i as u16 + 1));
    }
    u32::from(hash)
}

/// XOR every 32-bit little-endian word of `data` with `key`, in place.
///
/// Self-inverse; a key of 0 is the identity. A trailing partial word (never
/// produced by well-formed TOC blocks) is left untouched, matching the
/// original tool.
pub fn obfuscate(data: &mut [u8], key: u32) {
    for chunk in data.chunks_exact_mut(4) {
        let word = read_u32(chunk, 0) ^ key;
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Progress information during archive operations.
#[derive(Debug, Clone)]
pub struct FpkProgress {
    /// Current operation phase.
    pub phase: FpkPhase,
    /// Current item number (1-indexed).
    pub current: usize,
    /// Total number of items.
    pub total: usize,
    /// Current file being processed (if applicable).
    pub current_file: Option<String>,
}

impl FpkProgress {
    /// Create a new progress update.
    #[must_use]
    pub fn new(phase: FpkPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with a file name.
    #[must_use]
    pub fn with_file(
        phase: FpkPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0).
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of an archive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpkPhase {
    /// Scanning the input directory (during packing).
    ScanningFiles,
    /// Compressing and writing file payloads (during packing).
    CompressingFiles,
    /// Writing the table of contents and trailer.
    WritingTable,
    /// Reading the table of contents (during extraction).
    ReadingTable,
    /// Decompressing stored payloads (during extraction).
    DecompressingFiles,
    /// Writing extracted files to disk.
    WritingFiles,
    /// Operation complete.
    Complete,
}

impl FpkPhase {
    /// Get a human-readable description of this phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScanningFiles => "Scanning files",
            Self::CompressingFiles => "Compressing files",
            Self::WritingTable => "Writing file table",
            Self::ReadingTable => "Reading file table",
            Self::DecompressingFiles => "Decompressing files",
            Self::WritingFiles => "Writing files",
            Self::Complete => "Complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn record_roundtrip_v2() {
        let entry = FpkEntry::new(0x1234, 0x5678, "data.bin");
        let record = entry.to_record(FpkVersion::V2);
        assert_eq!(record.len(), 36);
        assert_eq!(FpkEntry::from_record(&record, FpkVersion::V2), entry);
    }

    #[test]
    fn record_roundtrip_v3() {
        let entry = FpkEntry::new(7, 9, "a-much-longer-filename-for-newer-archives.dat");
        let record = entry.to_record(FpkVersion::V3);
        assert_eq!(record.len(), 140);
        assert_eq!(FpkEntry::from_record(&record, FpkVersion::V3), entry);
    }

    #[test]
    fn plain_record_roundtrip() {
        let entry = FpkEntry::new(100, 200, "sprite.tex");
        let record = entry.to_plain_record();
        assert_eq!(record.len(), PLAIN_ENTRY_SIZE);
        assert_eq!(FpkEntry::from_plain_record(&record), entry);
    }

    #[test]
    fn name_field_is_nul_terminated() {
        let entry = FpkEntry::new(0, 0, "exactly-23-characters-x");
        let record = entry.to_record(FpkVersion::V2);
        assert_eq!(record[8 + 23], 0);
    }

    #[test]
    fn name_hash_is_case_insensitive() {
        assert_eq!(name_hash("Data.BIN"), name_hash("data.bin"));
    }

    #[test]
    fn name_hash_depends_on_position() {
        assert_ne!(name_hash("ab"), name_hash("ba"));
    }

    #[test]
    fn obfuscation_is_self_inverse() {
        let original: Vec<u8> = (0u8..=35).collect();
        let mut data = original.clone();
        obfuscate(&mut data, 0xDEADBEEF);
        assert_ne!(data, original);
        obfuscate(&mut data, 0xDEADBEEF);
        assert_eq!(data, original);
    }

    #[test]
    fn zero_key_is_identity() {
        let original = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut data = original.clone();
        obfuscate(&mut data, 0);
        assert_eq!(data, original);
    }
}
