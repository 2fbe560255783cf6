//! CLI command for listing FPK archive contents

use std::path::Path;

use crate::fpk::list_fpk;

/// Format byte size for human-readable output
fn format_size(bytes: u32) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", f64::from(bytes) / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", f64::from(bytes) / 1024.0)
    } else {
        format!("{bytes}")
    }
}

pub fn execute(source: &Path, detailed: bool, count: bool) -> anyhow::Result<()> {
    let entries = list_fpk(source)?;

    if count {
        println!("{}", entries.len());
        return Ok(());
    }

    if detailed {
        println!("{:>10}  {:>10}  {:>8}  NAME", "OFFSET", "SIZE", "HASH");
        for entry in &entries {
            println!(
                "{:>10}  {:>10}  {:>8}  {}",
                entry.offset,
                format_size(entry.length),
                format!("{:04x}", entry.hash),
                entry.filename
            );
        }
        let total: u64 = entries.iter().map(|e| u64::from(e.length)).sum();
        println!();
        println!(
            "{} files, {} stored",
            entries.len(),
            format_size(u32::try_from(total).unwrap_or(u32::MAX))
        );
    } else {
        for entry in &entries {
            println!("{}", entry.filename);
        }
    }

    Ok(())
}
