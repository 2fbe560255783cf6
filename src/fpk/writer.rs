//! FPK archive writer with progress callbacks
//!
//! Packs the regular files of one directory (non-recursive) into an
//! obfuscated-TOC archive: entry count with the top bit set, stored
//! payloads, XOR-obfuscated TOC records sorted by name hash, and the
//! end-of-file trailer carrying the key and the TOC offset.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use walkdir::WalkDir;

use crate::codec::{Codec, FpkPayloadCodec};
use crate::error::{Error, Result};
use crate::pipeline::{CompressionPipeline, Direction, PipelineConfig, Task};
use super::reader::ProgressCallback;
use super::types::{
    FpkEntry, FpkPhase, FpkProgress, FpkVersion, name_hash, obfuscate, OBFUSCATED_FLAG,
};

/// Packing parameters.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Worker thread count; 0 = detected parallelism, 1 = sequential.
    pub threads: usize,
    /// TOC obfuscation key. 0 leaves the records readable (XOR identity)
    /// while keeping the obfuscated layout.
    pub key: u32,
    /// Compress payloads with ZLC; false stores them raw.
    pub zlc: bool,
    /// Advisory in-flight memory ceiling for the pipeline.
    pub memory_limit: usize,
    /// TOC record layout to emit.
    pub version: FpkVersion,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            key: 0,
            zlc: true,
            memory_limit: crate::pipeline::DEFAULT_MEMORY_LIMIT,
            version: FpkVersion::V2,
        }
    }
}

/// FPK archive writer.
pub struct FpkWriter {
    input_dir: PathBuf,
    options: PackOptions,
}

impl FpkWriter {
    /// Create a writer over an input directory.
    ///
    /// # Errors
    /// Fails if the path does not exist or is not a directory.
    pub fn new(input_dir: impl Into<PathBuf>, options: PackOptions) -> Result<Self> {
        let input_dir = input_dir.into();
        if !input_dir.exists() {
            return Err(Error::InputNotFound(input_dir));
        }
        if !input_dir.is_dir() {
            return Err(Error::InputNotDirectory(input_dir));
        }
        Ok(Self { input_dir, options })
    }

    /// Collect the top-level regular files of the input directory, sorted
    /// by filename. Subdirectories are skipped with a warning; the archive
    /// namespace is flat.
    pub fn collect_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let max_name = self.options.version.filename_len() - 1;
        let mut files = Vec::new();
        for dirent in WalkDir::new(&self.input_dir).min_depth(1).max_depth(1) {
            let dirent = dirent?;
            if !dirent.file_type().is_file() {
                tracing::warn!("skipping non-file entry {}", dirent.path().display());
                continue;
            }
            let Some(name) = dirent.file_name().to_str() else {
                return Err(Error::InvalidPath(
                    dirent.path().display().to_string(),
                ));
            };
            if name.len() > max_name {
                return Err(Error::FilenameTooLong {
                    name: name.to_string(),
                    max: max_name,
                });
            }
            files.push((name.to_string(), dirent.into_path()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Pack the input directory into `output`.
    pub fn write(&self, output: &Path, progress: Option<ProgressCallback>) -> Result<()> {
        let noop = |_: &FpkProgress| {};
        let progress = progress.unwrap_or(&noop);

        progress(&FpkProgress::new(FpkPhase::ScanningFiles, 0, 1));
        let files = self.collect_files()?;
        let total = files.len();
        let count =
            u32::try_from(total).map_err(|_| Error::TooManyEntries { count: u32::MAX })?;
        if count & OBFUSCATED_FLAG != 0 {
            return Err(Error::TooManyEntries { count });
        }

        let mut out = BufWriter::new(File::create(output)?);
        out.write_u32::<LittleEndian>(count | OBFUSCATED_FLAG)?;

        let entries = if self.options.threads == 1 {
            self.write_payloads_sequential(&mut out, &files, progress)?
        } else {
            self.write_payloads_pipelined(&mut out, files, progress)?
        };

        progress(&FpkProgress::new(FpkPhase::WritingTable, 0, 1));
        self.write_toc(&mut out, entries)?;
        out.flush()?;

        progress(&FpkProgress::new(FpkPhase::Complete, total, total));
        Ok(())
    }

    fn codec(&self) -> FpkPayloadCodec {
        if self.options.zlc {
            FpkPayloadCodec::new()
        } else {
            FpkPayloadCodec::stored()
        }
    }

    fn write_payloads_sequential(
        &self,
        out: &mut BufWriter<File>,
        files: &[(String, PathBuf)],
        progress: ProgressCallback,
    ) -> Result<Vec<FpkEntry>> {
        let codec = self.codec();
        let total = files.len();
        let mut entries = Vec::with_capacity(total);
        for (i, (name, path)) in files.iter().enumerate() {
            progress(&FpkProgress::with_file(
                FpkPhase::CompressingFiles,
                i + 1,
                total,
                name.clone(),
            ));
            let data = load_input_file(name, path)?;
            let payload = codec.compress(&data)?;
            entries.push(append_payload(out, name, &payload)?);
        }
        Ok(entries)
    }

    /// Compress on the worker pool while this thread writes finished
    /// payloads out in completion order. A loader thread streams file
    /// contents in, stalling while the pipeline's memory gauge is over its
    /// ceiling.
    fn write_payloads_pipelined(
        &self,
        out: &mut BufWriter<File>,
        files: Vec<(String, PathBuf)>,
        progress: ProgressCallback,
    ) -> Result<Vec<FpkEntry>> {
        let total = files.len();
        let config = PipelineConfig {
            threads: self.options.threads,
            memory_limit: self.options.memory_limit,
        };
        let mut pipeline = CompressionPipeline::new(Arc::new(self.codec()), &config);
        pipeline.start(Direction::Compress)?;

        let mut entries = Vec::with_capacity(total);
        let mut written = 0;
        let abort = std::sync::atomic::AtomicBool::new(false);
        let result = std::thread::scope(|scope| -> Result<()> {
            let pipe = &pipeline;
            let abort = &abort;
            let mut loader = Some(scope.spawn(move || -> (usize, Option<Error>) {
                let mut submitted = 0;
                for (name, path) in files {
                    while pipe.memory_usage() > pipe.memory_limit() {
                        if abort.load(std::sync::atomic::Ordering::SeqCst) {
                            return (submitted, None);
                        }
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                    match load_input_file(&name, &path) {
                        Ok(data) => {
                            pipe.submit(Task::new(name, data));
                            submitted += 1;
                        }
                        Err(err) => return (submitted, Some(err)),
                    }
                }
                (submitted, None)
            }));

            // expected count is unknown until the loader finishes; drain
            // opportunistically in the meantime
            let mut expected = None;
            loop {
                if let Some(task) = pipeline.try_take() {
                    written += 1;
                    progress(&FpkProgress::with_file(
                        FpkPhase::CompressingFiles,
                        written,
                        total,
                        task.name.clone(),
                    ));
                    match append_payload(out, &task.name, &task.payload) {
                        Ok(entry) => entries.push(entry),
                        Err(err) => {
                            // unblock a loader stalled at the memory
                            // ceiling, or the scope would wait forever
                            abort.store(true, std::sync::atomic::Ordering::SeqCst);
                            return Err(err);
                        }
                    }
                    continue;
                }
                match expected {
                    Some(n) if written >= n => break,
                    Some(_) => std::thread::sleep(std::time::Duration::from_millis(1)),
                    None => {
                        let finished = loader.as_ref().is_some_and(|h| h.is_finished());
                        if finished {
                            if let Some(handle) = loader.take() {
                                let (submitted, err) = handle
                                    .join()
                                    .unwrap_or((written, Some(loader_panic_error())));
                                if let Some(err) = err {
                                    return Err(err);
                                }
                                expected = Some(submitted);
                            }
                        } else {
                            std::thread::sleep(std::time::Duration::from_millis(1));
                        }
                    }
                }
            }
            Ok(())
        });
        pipeline.stop_and_wait();
        result?;

        Ok(entries)
    }

    fn write_toc(&self, out: &mut BufWriter<File>, mut entries: Vec<FpkEntry>) -> Result<()> {
        let toc_offset = checked_offset(out.stream_position()?)?;
        entries.sort_by_key(|entry| entry.hash);

        let mut block = Vec::with_capacity(entries.len() * self.options.version.entry_size());
        for entry in &entries {
            block.extend_from_slice(&entry.to_record(self.options.version));
        }
        obfuscate(&mut block, self.options.key);
        out.write_all(&block)?;

        out.write_u32::<LittleEndian>(self.options.key)?;
        out.write_u32::<LittleEndian>(toc_offset)?;
        Ok(())
    }
}

fn loader_panic_error() -> Error {
    Error::Io(std::io::Error::other("file loader thread panicked"))
}

fn load_input_file(name: &str, path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    if u32::try_from(data.len()).is_err() {
        return Err(Error::FileTooLarge {
            name: name.to_string(),
            size: data.len(),
        });
    }
    Ok(data)
}

/// Write one stored payload at the current position and build its TOC
/// entry, checking that both offset and length fit the 32-bit fields.
fn append_payload(out: &mut BufWriter<File>, name: &str, payload: &[u8]) -> Result<FpkEntry> {
    let offset = checked_offset(out.stream_position()?)?;
    let length = u32::try_from(payload.len()).map_err(|_| Error::FileTooLarge {
        name: name.to_string(),
        size: payload.len(),
    })?;
    out.write_all(payload)?;
    tracing::debug!(name, offset, length, hash = name_hash(name), "stored entry");
    Ok(FpkEntry::new(offset, length, name))
}

fn checked_offset(position: u64) -> Result<u32> {
    u32::try_from(position).map_err(|_| Error::ArchiveTooLarge { size: position })
}

/// Pack a directory into an archive on disk.
pub fn pack_fpk(
    input_dir: impl Into<PathBuf>,
    output: impl AsRef<Path>,
    options: PackOptions,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    FpkWriter::new(input_dir, options)?.write(output.as_ref(), progress)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::fpk::reader::{ExtractOptions, FpkReader};

    fn input_dir(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn missing_input_is_an_error() {
        let result = FpkWriter::new("/no/such/directory", PackOptions::default());
        assert!(matches!(result, Err(Error::InputNotFound(_))));
    }

    #[test]
    fn file_input_is_an_error() {
        let dir = input_dir(&[("plain.txt", b"x".as_slice())]);
        let result = FpkWriter::new(dir.path().join("plain.txt"), PackOptions::default());
        assert!(matches!(result, Err(Error::InputNotDirectory(_))));
    }

    #[test]
    fn long_filenames_are_rejected() {
        let dir = input_dir(&[("this-filename-is-way-past-the-limit.bin", b"x".as_slice())]);
        let writer = FpkWriter::new(dir.path(), PackOptions::default()).unwrap();
        assert!(matches!(
            writer.collect_files(),
            Err(Error::FilenameTooLong { .. })
        ));
    }

    #[test]
    fn subdirectories_are_skipped() {
        let dir = input_dir(&[("keep.bin", b"x".as_slice())]);
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("lost.bin"), b"y").unwrap();

        let writer = FpkWriter::new(dir.path(), PackOptions::default()).unwrap();
        let files = writer.collect_files().unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["keep.bin"]);
    }

    #[test]
    fn packed_archive_reads_back() {
        let dir = input_dir(&[
            ("alpha.dat", b"alpha alpha alpha alpha alpha".as_slice()),
            ("beta.dat", b"completely different bytes".as_slice()),
        ]);
        let out = TempDir::new().unwrap();
        let archive = out.path().join("test.fpk");

        let options = PackOptions {
            threads: 1,
            key: 0x0BADF00D,
            ..PackOptions::default()
        };
        pack_fpk(dir.path(), &archive, options, None).unwrap();

        let mut reader = FpkReader::open(&archive).unwrap();
        assert_eq!(reader.read_entry_count().unwrap(), 2);
        assert!(reader.is_obfuscated());
        let mut names: Vec<String> = reader
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|entry| entry.filename)
            .collect();
        names.sort();
        assert_eq!(names, ["alpha.dat", "beta.dat"]);
        assert_eq!(
            reader.read_file("alpha.dat").unwrap().unwrap(),
            b"alpha alpha alpha alpha alpha"
        );
    }

    #[test]
    fn toc_is_sorted_by_hash() {
        let dir = input_dir(&[
            ("zzz.bin", b"1".as_slice()),
            ("a.bin", b"2".as_slice()),
            ("mm.bin", b"3".as_slice()),
        ]);
        let out = TempDir::new().unwrap();
        let archive = out.path().join("sorted.fpk");
        let options = PackOptions {
            threads: 1,
            ..PackOptions::default()
        };
        pack_fpk(dir.path(), &archive, options, None).unwrap();

        let mut reader = FpkReader::open(&archive).unwrap();
        let entries = reader.list_entries().unwrap();
        let hashes: Vec<u32> = entries.iter().map(|entry| entry.hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted);
    }

    #[test]
    fn pipelined_pack_roundtrips() {
        let files: Vec<(String, Vec<u8>)> = (0..12)
            .map(|i| {
                (
                    format!("file-{i:02}.bin"),
                    format!("contents of file {i} ").repeat(50).into_bytes(),
                )
            })
            .collect();
        let dir = TempDir::new().unwrap();
        for (name, contents) in &files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let out = TempDir::new().unwrap();
        let archive = out.path().join("parallel.fpk");

        let options = PackOptions {
            threads: 3,
            key: 0x12345678,
            ..PackOptions::default()
        };
        pack_fpk(dir.path(), &archive, options, None).unwrap();

        let extract_dir = out.path().join("extracted");
        let mut reader = FpkReader::open(&archive).unwrap();
        reader
            .extract_all(&extract_dir, &ExtractOptions::default(), None)
            .unwrap();

        for (name, contents) in &files {
            assert_eq!(&std::fs::read(extract_dir.join(name)).unwrap(), contents);
        }
    }
}
