use crate::cli::{AiAction, Cli};
use crate::commands::{Context, Result};
use crate::output::{format_output, spinner, OutputData};
use medmatch_core::assistant::ResearchProfile;
use medmatch_core::Assistant;

pub async fn run(cli: &Cli, action: &AiAction) -> Result<()> {
    let ctx = Context::load(cli)?;
    let assistant = Assistant::from_config(&ctx.config.assistant)?;
    if !assistant.is_online() {
        tracing::info!("GEMINI_API_KEY is not set; returning offline answers");
    }

    let progress = spinner(&cli.output, "Thinking...");
    let data = match action {
        AiAction::Analyze { text } => OutputData::ConditionAnalysis(assistant.analyze_condition(text).await),
        AiAction::Summary { title, description } => OutputData::TrialSummary {
            title: title.clone(),
            summary: assistant.trial_summary(title, description).await,
        },
        AiAction::Suggest {
            specialties,
            interests,
            question,
        } => {
            let profile = ResearchProfile {
                specialties: specialties.clone(),
                research_interests: interests.clone(),
                question: question.clone(),
            };
            OutputData::Suggestions(assistant.research_suggestions(&profile).await)
        }
    };
    progress.finish_and_clear();

    format_output(&data, &cli.output)
}
