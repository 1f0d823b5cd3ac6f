use crate::cli::OutputFormat;
use crate::commands::Result;
use indicatif::{ProgressBar, ProgressStyle};
use medmatch_core::admin::{AdminRequest, MeetingRoute, NudgeInvitation};
use medmatch_core::assistant::ConditionAnalysis;
#[cfg(feature = "pubmed")]
use medmatch_core::sources::pubmed::PublicationSearch;
use medmatch_core::seed::SeedSummary;
use medmatch_core::{SearchOutcome, SourceInfo};
use serde::Serialize;
use serde_json::Value;

mod pretty;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutputData {
    SearchResults(SearchOutcome),
    #[cfg(feature = "pubmed")]
    Publications(PublicationSearch),
    AdminRequests(Vec<AdminRequest>),
    AdminRequest(AdminRequest),
    MeetingRoute(MeetingRoute),
    Invitation(NudgeInvitation),
    OrcidProfile(Value),
    ConditionAnalysis(ConditionAnalysis),
    TrialSummary { title: String, summary: String },
    Suggestions(Vec<String>),
    SeedSummary(SeedSummary),
    Sources(Vec<SourceInfo>),
    ConfigInfo(Value),
}

pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Pretty => {
            pretty::print(data)?;
        }
    }
    Ok(())
}

/// Spinner for slow calls; hidden unless the output is for a human.
pub fn spinner(format: &OutputFormat, message: impl Into<String>) -> ProgressBar {
    if *format != OutputFormat::Pretty {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
