//! CLI command for extracting FPK archives

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cli::progress::{print_done, print_step, simple_bar, DISK, LOOKING_GLASS, PACKAGE};
use crate::fpk::{ExtractOptions, FpkPhase, FpkReader, FpkVersion};

/// Default output directory: `data.fpk` extracts to `data/`, anything
/// without the extension gets `_out` appended.
fn default_destination(source: &Path) -> PathBuf {
    if source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("fpk"))
    {
        source.with_extension("")
    } else {
        let mut name = source.as_os_str().to_os_string();
        name.push("_out");
        PathBuf::from(name)
    }
}

pub fn execute(
    source: &Path,
    destination: Option<&Path>,
    threads: usize,
    v3: bool,
    show_progress: bool,
) -> anyhow::Result<()> {
    let destination = destination.map_or_else(|| default_destination(source), Path::to_path_buf);
    let started = Instant::now();

    let options = ExtractOptions {
        threads,
        version: if v3 { FpkVersion::V3 } else { FpkVersion::V2 },
        ..ExtractOptions::default()
    };

    if show_progress {
        print_step(1, 3, LOOKING_GLASS, "Reading archive table...");
    }
    let mut reader = FpkReader::with_version(std::fs::File::open(source)?, options.version);
    let entries = reader.list_entries()?;

    if show_progress {
        print_step(2, 3, PACKAGE, "Decompressing entries...");
    }
    let pb = show_progress.then(|| simple_bar(entries.len() as u64, "Extracting"));
    let on_progress = |progress: &crate::fpk::FpkProgress| {
        if let Some(pb) = &pb {
            if matches!(
                progress.phase,
                FpkPhase::WritingFiles | FpkPhase::DecompressingFiles
            ) {
                pb.set_position(progress.current as u64);
                if let Some(name) = &progress.current_file {
                    pb.set_message(name.clone());
                }
            }
        }
    };
    reader.extract_all(&destination, &options, Some(&on_progress))?;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    if show_progress {
        print_step(3, 3, DISK, "Files written");
        println!(
            "Extracted {} files to {}",
            entries.len(),
            destination.display()
        );
        print_done(started.elapsed());
    }
    Ok(())
}
