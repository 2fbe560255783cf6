//! FPK archive reader with progress callbacks
//!
//! Reads both TOC variants: the plain layout (entry count with a clear top
//! bit, 32-byte records right after it) and the obfuscated layout (top bit
//! set, records addressed by an end-of-file trailer and XOR-obfuscated with
//! the trailer key). Stored payloads are decoded through the RLE0-then-ZLC
//! chain; entries stored without either transform pass through unchanged.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::codec::{Codec, FpkPayloadCodec};
use crate::error::{Error, Result};
use crate::pipeline::{CompressionPipeline, Direction, PipelineConfig, Task};
use super::types::{
    FpkEntry, FpkPhase, FpkProgress, FpkTrailer, FpkVersion, obfuscate, OBFUSCATED_FLAG,
    PLAIN_ENTRY_SIZE, TRAILER_SIZE,
};

/// Progress callback type.
pub type ProgressCallback<'a> = &'a dyn Fn(&FpkProgress);

/// Extraction parameters.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Worker thread count; 0 = detected parallelism, 1 = sequential.
    pub threads: usize,
    /// Advisory in-flight memory ceiling for the pipeline.
    pub memory_limit: usize,
    /// TOC record layout of obfuscated archives.
    pub version: FpkVersion,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            memory_limit: crate::pipeline::DEFAULT_MEMORY_LIMIT,
            version: FpkVersion::V2,
        }
    }
}

/// FPK archive reader.
pub struct FpkReader<R: Read + Seek> {
    reader: BufReader<R>,
    entry_count: Option<u32>,
    obfuscated: bool,
    version: FpkVersion,
    trailer: Option<FpkTrailer>,
    toc: Vec<FpkEntry>,
}

impl FpkReader<File> {
    /// Open an archive from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> FpkReader<R> {
    /// Create a reader over a `Read + Seek` source, assuming the V2 record
    /// layout for obfuscated archives.
    pub fn new(reader: R) -> Self {
        Self::with_version(reader, FpkVersion::V2)
    }

    /// Create a reader with an explicit archive version.
    pub fn with_version(reader: R, version: FpkVersion) -> Self {
        Self {
            reader: BufReader::new(reader),
            entry_count: None,
            obfuscated: false,
            version,
            trailer: None,
            toc: Vec::new(),
        }
    }

    /// Read the leading entry count and split off the obfuscation flag.
    pub fn read_entry_count(&mut self) -> Result<u32> {
        self.reader.seek(SeekFrom::Start(0))?;
        let raw = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::TruncatedArchive {
                context: "entry count",
            })?;
        self.obfuscated = raw & OBFUSCATED_FLAG != 0;
        let count = raw & !OBFUSCATED_FLAG;

        // an entry needs at least one stored byte plus its TOC record, so
        // the archive size bounds the plausible count
        let file_size = self.reader.seek(SeekFrom::End(0))?;
        if u64::from(count) > file_size / PLAIN_ENTRY_SIZE as u64 + 1 {
            return Err(Error::TooManyEntries { count });
        }

        self.entry_count = Some(count);
        Ok(count)
    }

    /// Whether the archive uses the obfuscated TOC variant. Only meaningful
    /// after [`Self::read_entry_count`].
    #[must_use]
    pub fn is_obfuscated(&self) -> bool {
        self.obfuscated
    }

    /// The trailer of an obfuscated archive, once the TOC has been read.
    #[must_use]
    pub fn trailer(&self) -> Option<FpkTrailer> {
        self.trailer
    }

    /// Read and parse the table of contents (both variants).
    pub fn read_toc(&mut self) -> Result<&[FpkEntry]> {
        let count = match self.entry_count {
            Some(count) => count,
            None => self.read_entry_count()?,
        } as usize;

        self.toc.clear();
        if self.obfuscated {
            self.read_obfuscated_toc(count)?;
        } else {
            self.read_plain_toc(count)?;
        }
        Ok(&self.toc)
    }

    fn read_plain_toc(&mut self, count: usize) -> Result<()> {
        self.reader.seek(SeekFrom::Start(4))?;
        let mut record = vec![0u8; PLAIN_ENTRY_SIZE];
        for _ in 0..count {
            self.reader
                .read_exact(&mut record)
                .map_err(|_| Error::TruncatedArchive {
                    context: "plain TOC entry",
                })?;
            self.toc.push(FpkEntry::from_plain_record(&record));
        }
        Ok(())
    }

    fn read_obfuscated_toc(&mut self, count: usize) -> Result<()> {
        self.reader
            .seek(SeekFrom::End(-(TRAILER_SIZE as i64)))
            .map_err(|_| Error::TruncatedArchive { context: "trailer" })?;
        let key = self.reader.read_u32::<LittleEndian>()?;
        let toc_offset = self.reader.read_u32::<LittleEndian>()?;
        let trailer = FpkTrailer { key, toc_offset };
        tracing::debug!(key, toc_offset, "read FPK trailer");

        let entry_size = self.version.entry_size();
        let mut block = vec![0u8; entry_size * count];
        self.reader.seek(SeekFrom::Start(u64::from(toc_offset)))?;
        self.reader
            .read_exact(&mut block)
            .map_err(|_| Error::TruncatedArchive {
                context: "obfuscated TOC block",
            })?;

        obfuscate(&mut block, key);
        for record in block.chunks_exact(entry_size) {
            self.toc.push(FpkEntry::from_record(record, self.version));
        }

        self.trailer = Some(trailer);
        Ok(())
    }

    /// List the archive entries, reading the TOC first if necessary.
    pub fn list_entries(&mut self) -> Result<Vec<FpkEntry>> {
        if self.toc.is_empty() {
            self.read_toc()?;
        }
        Ok(self.toc.clone())
    }

    /// Read one entry's raw stored payload (still RLE0/ZLC encoded).
    pub fn read_entry_bytes(&mut self, entry: &FpkEntry) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut data = vec![0u8; entry.length as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|_| Error::TruncatedArchive {
                context: "entry payload",
            })?;
        Ok(data)
    }

    /// Read and decode one entry by name.
    pub fn read_file(&mut self, filename: &str) -> Result<Option<Vec<u8>>> {
        if self.toc.is_empty() {
            self.read_toc()?;
        }
        let Some(entry) = self.toc.iter().find(|e| e.filename == filename).cloned() else {
            return Ok(None);
        };
        let raw = self.read_entry_bytes(&entry)?;
        Ok(Some(FpkPayloadCodec::new().decompress(&raw)?))
    }

    /// Extract every entry into `out_dir`.
    ///
    /// With more than one worker, stored payloads are decoded on the
    /// pipeline while this thread keeps streaming raw entries in and
    /// writing finished files out (in completion order).
    pub fn extract_all(
        &mut self,
        out_dir: &Path,
        options: &ExtractOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let noop = |_: &FpkProgress| {};
        let progress = progress.unwrap_or(&noop);

        progress(&FpkProgress::new(FpkPhase::ReadingTable, 0, 1));
        if self.toc.is_empty() {
            self.read_toc()?;
        }
        let entries = self.toc.clone();
        for entry in &entries {
            validate_entry_name(&entry.filename)?;
        }

        std::fs::create_dir_all(out_dir)?;
        let total = entries.len();

        if options.threads == 1 {
            let codec = FpkPayloadCodec::new();
            for (i, entry) in entries.iter().enumerate() {
                progress(&FpkProgress::with_file(
                    FpkPhase::DecompressingFiles,
                    i + 1,
                    total,
                    entry.filename.clone(),
                ));
                let raw = self.read_entry_bytes(entry)?;
                let data = codec.decompress(&raw)?;
                std::fs::write(out_dir.join(&entry.filename), data)?;
            }
            progress(&FpkProgress::new(FpkPhase::Complete, total, total));
            return Ok(());
        }

        let config = PipelineConfig {
            threads: options.threads,
            memory_limit: options.memory_limit,
        };
        let mut pipeline =
            CompressionPipeline::new(Arc::new(FpkPayloadCodec::new()), &config);
        pipeline.start(Direction::Decompress)?;

        let mut written = 0;
        for entry in &entries {
            // keep draining while the producer side stalls on backpressure
            while pipeline.memory_usage() > pipeline.memory_limit() {
                match pipeline.try_take() {
                    Some(task) => {
                        written += 1;
                        write_extracted(out_dir, &task, written, total, progress)?;
                    }
                    None => std::thread::sleep(std::time::Duration::from_millis(1)),
                }
            }
            let raw = self.read_entry_bytes(entry)?;
            pipeline.submit(Task::new(entry.filename.clone(), raw));

            if let Some(task) = pipeline.try_take() {
                written += 1;
                write_extracted(out_dir, &task, written, total, progress)?;
            }
        }
        while written < total {
            let task = pipeline.take();
            written += 1;
            write_extracted(out_dir, &task, written, total, progress)?;
        }
        pipeline.stop_and_wait();

        progress(&FpkProgress::new(FpkPhase::Complete, total, total));
        Ok(())
    }
}

fn write_extracted(
    out_dir: &Path,
    task: &Task,
    current: usize,
    total: usize,
    progress: ProgressCallback,
) -> Result<()> {
    progress(&FpkProgress::with_file(
        FpkPhase::WritingFiles,
        current,
        total,
        task.name.clone(),
    ));
    let mut file = std::fs::File::create(out_dir.join(&task.name))?;
    file.write_all(&task.payload)?;
    Ok(())
}

/// Archive filenames are a flat namespace; anything that would escape the
/// output directory is rejected.
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(Error::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Extract an archive from disk into `out_dir`.
pub fn extract_fpk(
    archive: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    options: &ExtractOptions,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let file = File::open(archive.as_ref())?;
    let mut reader = FpkReader::with_version(file, options.version);
    reader.extract_all(out_dir.as_ref(), options, progress)
}

/// List the contents of an archive on disk.
pub fn list_fpk(archive: impl AsRef<Path>) -> Result<Vec<FpkEntry>> {
    let mut reader = FpkReader::open(archive)?;
    reader.list_entries()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_escaping_names() {
        assert!(validate_entry_name("fine.bin").is_ok());
        assert!(validate_entry_name("..").is_err());
        assert!(validate_entry_name("a/b").is_err());
        assert!(validate_entry_name("a\\b").is_err());
        assert!(validate_entry_name("").is_err());
    }

    #[test]
    fn empty_archive_lists_no_entries() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&OBFUSCATED_FLAG.to_le_bytes());
        // trailer: key 0, TOC at offset 4
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());

        let mut reader = FpkReader::new(std::io::Cursor::new(bytes));
        assert_eq!(reader.read_entry_count().unwrap(), 0);
        assert!(reader.is_obfuscated());
        assert!(reader.list_entries().unwrap().is_empty());
    }

    #[test]
    fn reads_plain_toc() {
        let entry = FpkEntry::new(36, 5, "x.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&entry.to_plain_record());
        bytes.extend_from_slice(b"hello");

        let mut reader = FpkReader::new(std::io::Cursor::new(bytes));
        let entries = reader.list_entries().unwrap();
        assert!(!reader.is_obfuscated());
        assert_eq!(entries, vec![entry.clone()]);
        assert_eq!(reader.read_entry_bytes(&entry).unwrap(), b"hello");
    }

    #[test]
    fn truncated_toc_is_an_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&FpkEntry::new(0, 0, "only-one").to_plain_record());

        let mut reader = FpkReader::new(std::io::Cursor::new(bytes));
        assert!(matches!(
            reader.read_toc(),
            Err(Error::TruncatedArchive { .. })
        ));
    }

    #[test]
    fn absurd_entry_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x7FFFFFFFu32.to_le_bytes());

        let mut reader = FpkReader::new(std::io::Cursor::new(bytes));
        assert!(matches!(
            reader.read_entry_count(),
            Err(Error::TooManyEntries { .. })
        ));
    }
}
