use crate::cli::{Cli, OrcidAction};
use crate::commands::Result;
#[cfg(feature = "orcid")]
use crate::commands::Context;
#[cfg(not(feature = "orcid"))]
use crate::commands::CommandError;
#[cfg(feature = "orcid")]
use crate::output::{format_output, spinner, OutputData};

#[cfg(feature = "orcid")]
pub async fn run(cli: &Cli, action: &OrcidAction) -> Result<()> {
    use medmatch_core::sources::orcid::OrcidSource;
    use medmatch_core::utils::validate_orcid_id;
    use medmatch_core::Source;

    match action {
        OrcidAction::Sync { orcid_id } => {
            // Reject malformed ids before loading anything.
            validate_orcid_id(orcid_id)?;
            let ctx = Context::load(cli)?;
            let source = OrcidSource::new(&ctx.config.source(Source::Orcid))?;

            let progress = spinner(&cli.output, format!("Syncing ORCID profile {}...", orcid_id));
            let profile = source.sync(orcid_id).await;
            progress.finish_and_clear();

            let profile = serde_json::to_value(profile?)?;
            format_output(&OutputData::OrcidProfile(profile), &cli.output)
        }
    }
}

#[cfg(not(feature = "orcid"))]
pub async fn run(_cli: &Cli, _action: &OrcidAction) -> Result<()> {
    Err(CommandError::InvalidInput(
        "ORCID support is not compiled in. Rebuild with --features orcid".to_string(),
    ))
}
