use crate::cli::{AdminAction, Cli};
use crate::commands::{CommandError, Context, Result};
use crate::output::{format_output, OutputData};
use medmatch_core::admin::{nudge_invitation, ContactRequest, MissingContactFlag, RequestStatus};
use medmatch_core::{AdminDesk, RecordKind, SearchableRecord, Source};

pub async fn run(cli: &Cli, action: &AdminAction) -> Result<()> {
    let ctx = Context::load(cli)?;
    let desk = AdminDesk::new(ctx.store.clone())?;

    let data = match action {
        AdminAction::List => OutputData::AdminRequests(desk.list_requests()?),
        AdminAction::Update { id, status } => {
            let status: RequestStatus = status.parse()?;
            OutputData::AdminRequest(desk.update_status(id, status)?)
        }
        AdminAction::Request {
            patient,
            email,
            expert_name,
            expert_id,
            message,
            urgency,
        } => {
            let mut contact = ContactRequest::new(patient, email, expert_name, expert_id)
                .with_message(message.clone().unwrap_or_default());
            contact.urgency = urgency.clone();
            OutputData::AdminRequest(desk.create_contact_request(contact)?)
        }
        AdminAction::Flag {
            name,
            id,
            source,
            specialty,
            institution,
        } => {
            let flag = MissingContactFlag {
                expert_name: name.clone(),
                expert_id: id.clone(),
                data_source: source.clone(),
                specialty: specialty.clone(),
                institution: institution.clone(),
                priority: "normal".to_string(),
            };
            OutputData::AdminRequest(desk.flag_missing_contact(flag)?)
        }
        AdminAction::Nudge {
            name,
            institution,
            source,
        } => {
            let source = Source::parse(source).ok_or_else(|| {
                CommandError::InvalidInput(format!(
                    "Unknown source '{}'. Expected one of: pubmed, orcid, clinicaltrials, scholar, researchgate",
                    source
                ))
            })?;
            let expert = SearchableRecord::external(source, 0, RecordKind::Expert, name.as_str())
                .with_institution(institution.as_str());
            OutputData::Invitation(nudge_invitation(&expert))
        }
    };

    format_output(&data, &cli.output)
}
