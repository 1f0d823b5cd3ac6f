use crate::cli::Cli;
use crate::commands::{Context, Result};
use crate::output::{format_output, OutputData};
use medmatch_core::config::StoreBackend;
use medmatch_core::seed::SeedFile;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(cli: &Cli, file: &Path) -> Result<()> {
    let ctx = Context::load(cli)?;
    let seed = SeedFile::from_path(file)?;
    let summary = seed.apply(ctx.store.as_ref())?;

    format_output(&OutputData::SeedSummary(summary), &cli.output)?;
    if ctx.config.store.backend == StoreBackend::Memory {
        eprintln!(
            "{} the store backend is 'memory'; set MEDMATCH_STORE or [store] backend = \"file\" to keep seeded rows",
            "Note:".yellow().bold()
        );
    }
    Ok(())
}
