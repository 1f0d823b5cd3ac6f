use crate::cli::Cli;
use crate::commands::{Context, Result};
use crate::output::{format_output, OutputData};
use medmatch_core::build_registry;

pub async fn run(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let registry = build_registry(&ctx.config)?;
    format_output(&OutputData::Sources(registry.list()), &cli.output)
}
