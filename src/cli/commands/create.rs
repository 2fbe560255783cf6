//! CLI command for creating FPK archives

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cli::progress::{print_done, print_step, simple_bar, DISK, LOOKING_GLASS, PACKAGE};
use crate::fpk::{FpkPhase, FpkVersion, FpkWriter, PackOptions};

pub fn execute(
    source: &Path,
    destination: Option<&Path>,
    key: u32,
    threads: usize,
    zlc: bool,
    v3: bool,
    show_progress: bool,
) -> anyhow::Result<()> {
    let destination = destination.map_or_else(
        || {
            let mut name = source.as_os_str().to_os_string();
            name.push(".fpk");
            PathBuf::from(name)
        },
        Path::to_path_buf,
    );
    let started = Instant::now();

    let options = PackOptions {
        threads,
        key,
        zlc,
        version: if v3 { FpkVersion::V3 } else { FpkVersion::V2 },
        ..PackOptions::default()
    };

    if show_progress {
        print_step(1, 3, LOOKING_GLASS, "Scanning input files...");
    }
    let writer = FpkWriter::new(source, options)?;
    let total = writer.collect_files()?.len();

    if show_progress {
        print_step(2, 3, PACKAGE, "Compressing and writing entries...");
    }
    let pb = show_progress.then(|| simple_bar(total as u64, "Packing"));
    let on_progress = |progress: &crate::fpk::FpkProgress| {
        if let Some(pb) = &pb {
            if progress.phase == FpkPhase::CompressingFiles {
                pb.set_position(progress.current as u64);
                if let Some(name) = &progress.current_file {
                    pb.set_message(name.clone());
                }
            }
        }
    };
    writer.write(&destination, Some(&on_progress))?;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    if show_progress {
        print_step(3, 3, DISK, "Archive written");
        println!("Packed {total} files into {}", destination.display());
        print_done(started.elapsed());
    }
    Ok(())
}
