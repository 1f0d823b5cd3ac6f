use crate::cli::{Cli, PublicationArgs, SearchArgs, SearchTarget};
use crate::commands::{CommandError, Context, Result};
use crate::output::{format_output, spinner, OutputData};
use medmatch_core::record::MAX_SOURCE_LIMIT;
use medmatch_core::{build_registry, RecordKind, SearchEngine, SearchOptions, Source};
use std::time::Duration;

fn check_limit(limit: usize) -> Result<()> {
    if limit > MAX_SOURCE_LIMIT {
        return Err(CommandError::InvalidInput(format!(
            "--limit must be at most {}",
            MAX_SOURCE_LIMIT
        )));
    }
    Ok(())
}

/// Options from configuration, overridden by command-line flags.
pub fn search_options(ctx: &Context, args: &SearchArgs) -> Result<SearchOptions> {
    let mut opts = SearchOptions::from_config(&ctx.config).with_external(args.external);
    if let Some(ms) = args.timeout_ms {
        opts = opts.with_timeout(Duration::from_millis(ms));
    }
    if let Some(limit) = args.limit {
        check_limit(limit)?;
        for source in Source::ALL.into_iter().filter(|s| !s.is_local()) {
            opts = opts.with_limit(source, limit);
        }
    }
    if args.fallback {
        opts.fallback_when_empty = true;
    }
    Ok(opts)
}

pub async fn run(cli: &Cli, target: &SearchTarget) -> Result<()> {
    let (kind, args) = match target {
        SearchTarget::Experts(args) => (RecordKind::Expert, args),
        SearchTarget::Trials(args) => (RecordKind::Trial, args),
        SearchTarget::Collaborators(args) => (RecordKind::Collaborator, args),
        SearchTarget::Publications(args) => return publications(cli, args).await,
    };

    let ctx = Context::load(cli)?;
    let opts = search_options(&ctx, args)?;
    let registry = if args.external {
        build_registry(&ctx.config)?
    } else {
        Default::default()
    };
    let engine =
        SearchEngine::new(ctx.store.clone(), registry).with_taxonomy(ctx.config.taxonomy()?);

    let progress = spinner(
        &cli.output,
        format!("Searching {} for '{}'...", kind.as_str(), args.query),
    );
    let outcome = engine.search(kind, &args.query, &opts).await;
    progress.finish_and_clear();

    format_output(&OutputData::SearchResults(outcome?), &cli.output)
}

#[cfg(feature = "pubmed")]
async fn publications(cli: &Cli, args: &PublicationArgs) -> Result<()> {
    use medmatch_core::sources::pubmed::PubMedSource;

    check_limit(args.limit)?;
    if args.query.trim().is_empty() {
        return Err(CommandError::InvalidInput("Search term is required".into()));
    }
    let ctx = Context::load(cli)?;
    let source = PubMedSource::new(&ctx.config.source(Source::Pubmed))?;

    let progress = spinner(
        &cli.output,
        format!("Searching PubMed publications for '{}'...", args.query),
    );
    let search = source.publications_or_fallback(&args.query, args.limit).await;
    progress.finish_and_clear();

    format_output(&OutputData::Publications(search), &cli.output)
}

#[cfg(not(feature = "pubmed"))]
async fn publications(_cli: &Cli, _args: &PublicationArgs) -> Result<()> {
    Err(CommandError::InvalidInput(
        "PubMed support is not compiled in. Rebuild with --features pubmed".to_string(),
    ))
}
