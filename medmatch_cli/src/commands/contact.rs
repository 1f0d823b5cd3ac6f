use crate::cli::{Cli, ContactArgs};
use crate::commands::{Context, Result};
use crate::output::{format_output, OutputData};
use medmatch_core::admin::MeetingRequest;
use medmatch_core::AdminDesk;

pub async fn run(cli: &Cli, args: &ContactArgs) -> Result<()> {
    let ctx = Context::load(cli)?;
    let desk = AdminDesk::new(ctx.store.clone())?;

    let request = MeetingRequest {
        patient_name: args.name.clone(),
        email: args.email.clone(),
        phone: args.phone.clone(),
        preferred_date: args.date.clone(),
        preferred_time: args.time.clone(),
        meeting_type: args.meeting_type.clone(),
        message: args.message.clone(),
        urgency: args.urgency.clone(),
        researcher_id: args.researcher_id.clone(),
    };
    let route = desk.route_meeting_request(request)?;

    format_output(&OutputData::MeetingRoute(route), &cli.output)
}
