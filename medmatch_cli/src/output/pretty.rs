//! Terminal rendering for `--output pretty`.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, ContentArrangement, Table};
use medmatch_core::admin::{AdminPayload, AdminRequest, MeetingRoute, NudgeInvitation};
use medmatch_core::{SearchOutcome, SearchableRecord, SourceReport};
use owo_colors::OwoColorize;
use serde_json::Value;

use super::OutputData;
use crate::commands::Result;

const TABLE_WIDTH: u16 = 120;

pub(super) fn print(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SearchResults(outcome) => print_search(outcome),
        #[cfg(feature = "pubmed")]
        OutputData::Publications(search) => print_publications(search),
        OutputData::AdminRequests(requests) => print_requests(requests),
        OutputData::AdminRequest(request) => print_request(request),
        OutputData::MeetingRoute(route) => print_route(route),
        OutputData::Invitation(invite) => print_invitation(invite),
        OutputData::OrcidProfile(profile) => print_orcid(profile),
        OutputData::ConditionAnalysis(analysis) => {
            println!("{}", "Primary condition".cyan().bold());
            println!("  {}", analysis.primary_condition);
            if analysis.identified_conditions.len() > 1
                || analysis.identified_conditions.first() != Some(&analysis.primary_condition)
            {
                println!();
                println!("{}", "Identified".dimmed());
                for c in &analysis.identified_conditions {
                    println!("  • {}", c);
                }
            }
        }
        OutputData::TrialSummary { title, summary } => {
            println!("{}", title.cyan().bold());
            println!();
            println!("{}", summary);
        }
        OutputData::Suggestions(suggestions) => {
            println!("{}", "Suggestions".cyan().bold());
            for s in suggestions {
                println!("  • {}", s);
            }
        }
        OutputData::SeedSummary(summary) => {
            println!(
                "{} {} researchers, {} trials ({} already present)",
                "Seeded".green().bold(),
                summary.researchers,
                summary.trials,
                summary.skipped.to_string().dimmed()
            );
        }
        OutputData::Sources(sources) => {
            if sources.is_empty() {
                println!("{}", "No external sources enabled".yellow());
                return Ok(());
            }
            let mut table = new_table(vec!["Source", "Kinds", "Description"]);
            for info in sources {
                let kinds: Vec<&str> = info.kinds.iter().map(|k| k.as_str()).collect();
                table.add_row(vec![
                    Cell::new(info.source.as_str()),
                    Cell::new(kinds.join(", ")),
                    Cell::new(&info.description),
                ]);
            }
            println!("{}", table);
        }
        OutputData::ConfigInfo(config) => {
            println!("{}", "Configuration".cyan().bold());
            println!();
            print!("{}", serde_yaml::to_string(config)?);
        }
    }
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(TABLE_WIDTH)
        .set_header(header);
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

fn contact_cell(record: &SearchableRecord) -> String {
    if record.contact_available {
        "✓ Direct".green().to_string()
    } else if record.needs_admin_review {
        "⚠ Via admin".yellow().to_string()
    } else {
        "✗ Unavailable".dimmed().to_string()
    }
}

#[cfg(feature = "pubmed")]
fn print_publications(search: &medmatch_core::sources::pubmed::PublicationSearch) {
    println!("{} {}", "Publications:".dimmed(), search.query.cyan().bold());
    if let Some(error) = &search.error {
        println!("{} {}", "⚠ PubMed unavailable:".yellow(), error.dimmed());
    } else if search.fallback {
        println!("{}", "No PubMed results; showing built-in publications".yellow());
    }
    println!();

    if search.publications.is_empty() {
        println!("{}", "No matching publications".yellow());
        return;
    }
    let mut table = new_table(vec!["ID", "Title", "Journal", "Authors", "Date", "DOI"]);
    for p in &search.publications {
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(truncate(&p.title, 50)),
            Cell::new(truncate(&p.journal, 24)),
            Cell::new(truncate(&p.authors.join(", "), 30)),
            Cell::new(&p.date),
            Cell::new(p.doi.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{}", table);
}

fn print_search(outcome: &SearchOutcome) {
    println!(
        "{} {} {}",
        "Search:".dimmed(),
        if outcome.query.is_empty() { "(all)" } else { outcome.query.as_str() }.cyan().bold(),
        format!("[{}]", outcome.kind.as_str()).dimmed()
    );
    println!();

    if outcome.records.is_empty() {
        println!("{}", "No matching records".yellow());
    } else {
        let mut table = new_table(vec!["ID", "Name", "Source", "Institution", "Location", "Focus", "Contact"]);
        for record in &outcome.records {
            table.add_row(vec![
                Cell::new(record.id),
                Cell::new(truncate(&record.display_name, 40)),
                Cell::new(record.source.label()),
                Cell::new(truncate(record.institution_name(), 30)),
                Cell::new(truncate(record.location(), 24)),
                Cell::new(truncate(record.primary_specialty(), 24)),
                Cell::new(contact_cell(record)),
            ]);
        }
        println!("{}", table);
    }

    println!();
    for report in &outcome.reports {
        print_report(report);
    }
    println!(
        "{} {} results in {}ms",
        "Total:".dimmed(),
        outcome.records.len().to_string().green().bold(),
        outcome.duration_ms
    );
}

fn print_report(report: &SourceReport) {
    match &report.error {
        None => println!(
            "  {} {:<14} {} {}",
            "✓".green(),
            report.source.as_str(),
            report.count,
            format!("({}ms)", report.duration_ms).dimmed()
        ),
        Some(error) if report.is_timeout => println!(
            "  {} {:<14} {}",
            "⏱".yellow(),
            report.source.as_str(),
            error.yellow()
        ),
        Some(error) => println!(
            "  {} {:<14} {}",
            "✗".red(),
            report.source.as_str(),
            truncate(error, 80).red()
        ),
    }
}

fn print_requests(requests: &[AdminRequest]) {
    if requests.is_empty() {
        println!("{}", "No admin requests".dimmed());
        return;
    }
    let mut table = new_table(vec!["ID", "Type", "Status", "Expert", "Created"]);
    for request in requests {
        table.add_row(vec![
            Cell::new(&request.id),
            Cell::new(request.payload.kind_str()),
            Cell::new(request.status.as_str()),
            Cell::new(truncate(request.payload.expert_name(), 32)),
            Cell::new(request.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{}", table);
}

fn print_request(request: &AdminRequest) {
    println!("{} {}", "Request".cyan().bold(), request.id.bold());
    println!("  {:<10} {}", "type".dimmed(), request.payload.kind_str());
    println!("  {:<10} {}", "status".dimmed(), request.status.as_str().yellow());
    println!("  {:<10} {}", "expert".dimmed(), request.payload.expert_name());
    match &request.payload {
        AdminPayload::ExternalExpertContact(contact) => {
            println!("  {:<10} {} <{}>", "patient".dimmed(), contact.patient_name, contact.email);
            if !contact.message.is_empty() {
                println!("  {:<10} {}", "message".dimmed(), contact.message);
            }
            println!("  {:<10} {}", "urgency".dimmed(), contact.urgency);
        }
        AdminPayload::MissingContactInfo(flag) => {
            println!("  {:<10} {}", "source".dimmed(), flag.data_source);
            if let Some(institution) = &flag.institution {
                println!("  {:<10} {}", "institution".dimmed(), institution);
            }
            println!("  {:<10} {}", "priority".dimmed(), flag.priority);
        }
    }
    println!(
        "  {:<10} {}",
        "updated".dimmed(),
        request.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_route(route: &MeetingRoute) {
    match route {
        MeetingRoute::AdminRequest(request) => {
            println!(
                "{}",
                "Researcher is not on the platform; request forwarded to an admin.".yellow()
            );
            println!();
            print_request(request);
        }
        MeetingRoute::DirectRequest(row) => {
            println!("{}", "Meeting request sent directly to the researcher.".green());
            if let Some(id) = row.get("id") {
                println!("  {:<10} {}", "id".dimmed(), id);
            }
        }
    }
}

fn print_invitation(invite: &NudgeInvitation) {
    println!("{} {}", "Invitation for".cyan().bold(), invite.expert_name.bold());
    println!("  {:<12} {}", "to".dimmed(), invite.expert_email);
    if !invite.expert_institution.is_empty() {
        println!("  {:<12} {}", "institution".dimmed(), invite.expert_institution);
    }
    println!("  {:<12} {}", "found via".dimmed(), invite.source.label());
    println!();
    for benefit in &invite.benefits {
        println!("  • {}", benefit);
    }
    println!();
    println!("  {}", invite.call_to_action.green());
    println!("  {}", "(not sent)".dimmed());
}

fn print_orcid(profile: &Value) {
    let field = |key: &str| profile.get(key).and_then(Value::as_str).unwrap_or("-");
    println!("{} {}", field("name").cyan().bold(), format!("({})", field("orcid_id")).dimmed());
    println!("  {}", field("institution"));
    let publications = profile
        .get("publications")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if publications.is_empty() {
        return;
    }
    println!();
    println!("{}", "Recent publications".bold());
    for publication in &publications {
        let get = |key: &str| publication.get(key).and_then(Value::as_str).unwrap_or("");
        println!("  • {}", get("title"));
        println!("    {} {}", get("journal").dimmed(), get("date").dimmed());
    }
}
