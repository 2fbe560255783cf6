//! fpktool command-line binary

fn main() -> anyhow::Result<()> {
    fpktool::cli::run_cli()
}
