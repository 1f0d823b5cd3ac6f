//! Admin desk: human-mediated actions around contacting researchers.
//!
//! Requests are persisted in the `admin_requests` table of whatever
//! [`RecordStore`] the desk was built with. Once created, a request only
//! changes through [`AdminDesk::update_status`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::MatchError;
use crate::record::{is_external_id, SearchableRecord, Source};
use crate::store::{row_id, Filter, RecordStore, Row, Table};
use crate::utils::{sanitize_input, validate_email};

const DEFAULT_URGENCY: &str = "normal";
const DEFAULT_MEETING_TYPE: &str = "video";

fn default_urgency() -> String {
    DEFAULT_URGENCY.to_string()
}

fn default_meeting_type() -> String {
    DEFAULT_MEETING_TYPE.to_string()
}

fn default_data_source() -> String {
    "External".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingAdminReview,
    InProgress,
    Resolved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::PendingAdminReview => "pending_admin_review",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending_admin_review" | "pending" => Ok(RequestStatus::PendingAdminReview),
            "in_progress" => Ok(RequestStatus::InProgress),
            "resolved" => Ok(RequestStatus::Resolved),
            other => Err(MatchError::InvalidInput(format!(
                "Unknown request status '{}' (expected pending_admin_review, in_progress or resolved)",
                other
            ))),
        }
    }
}

/// A patient asking to reach an expert who is not directly contactable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub patient_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub expert_name: String,
    pub expert_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_source: Option<Source>,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<String>,
}

impl ContactRequest {
    pub fn new(
        patient_name: impl Into<String>,
        email: impl Into<String>,
        expert_name: impl Into<String>,
        expert_id: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: patient_name.into(),
            email: email.into(),
            phone: None,
            expert_name: expert_name.into(),
            expert_id: expert_id.into(),
            expert_source: None,
            message: String::new(),
            urgency: default_urgency(),
            preferred_date: None,
            preferred_time: None,
            meeting_type: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// An external expert surfaced without usable contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingContactFlag {
    pub expert_name: String,
    pub expert_id: String,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default = "default_urgency")]
    pub priority: String,
}

impl MissingContactFlag {
    /// Flag built from a search result.
    pub fn for_record(record: &SearchableRecord) -> Self {
        Self {
            expert_name: record.display_name.clone(),
            expert_id: record.id.to_string(),
            data_source: record.source.label().to_string(),
            specialty: record.specialties.first().cloned(),
            institution: (!record.institution_raw.is_empty()).then(|| record.institution_raw.clone()),
            priority: default_urgency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminPayload {
    ExternalExpertContact(ContactRequest),
    MissingContactInfo(MissingContactFlag),
}

impl AdminPayload {
    pub fn kind_str(&self) -> &'static str {
        match self {
            AdminPayload::ExternalExpertContact(_) => "external_expert_contact",
            AdminPayload::MissingContactInfo(_) => "missing_contact_info",
        }
    }

    /// Identifier the request is about.
    pub fn subject(&self) -> &str {
        match self {
            AdminPayload::ExternalExpertContact(c) => &c.expert_id,
            AdminPayload::MissingContactInfo(f) => &f.expert_id,
        }
    }

    pub fn expert_name(&self) -> &str {
        match self {
            AdminPayload::ExternalExpertContact(c) => &c.expert_name,
            AdminPayload::MissingContactInfo(f) => &f.expert_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRequest {
    pub id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: AdminPayload,
}

impl AdminRequest {
    fn to_row(&self) -> Result<Row, MatchError> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(MatchError::Internal("admin request did not serialize to an object".into())),
        }
    }

    fn from_row(row: &Row) -> Result<Self, MatchError> {
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }
}

/// A patient's request to meet a researcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub patient_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub preferred_date: Option<String>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_urgency")]
    pub urgency: String,
    pub researcher_id: String,
}

impl MeetingRequest {
    pub fn new(
        patient_name: impl Into<String>,
        email: impl Into<String>,
        researcher_id: impl Into<String>,
    ) -> Self {
        Self {
            patient_name: patient_name.into(),
            email: email.into(),
            phone: None,
            preferred_date: None,
            preferred_time: None,
            meeting_type: default_meeting_type(),
            message: None,
            urgency: default_urgency(),
            researcher_id: researcher_id.into(),
        }
    }
}

/// Where a meeting request ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MeetingRoute {
    /// The researcher is external or unregistered; an admin handles it.
    AdminRequest(AdminRequest),
    /// Stored as a direct `meeting_requests` row.
    DirectRequest(Row),
}

/// Platform-join invitation for an external expert. Built, never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeInvitation {
    pub expert_name: String,
    pub expert_email: String,
    pub expert_institution: String,
    pub invitation_type: String,
    pub source: Source,
    pub benefits: Vec<String>,
    pub call_to_action: String,
    pub created_at: DateTime<Utc>,
}

const NUDGE_BENEFITS: [&str; 4] = [
    "Connect directly with patients seeking your expertise",
    "Expand your research network",
    "Access to clinical trial opportunities",
    "Professional profile visibility",
];

/// Outreach address guessed from a display name: `first.last@institution.edu`.
pub fn guess_email(name: &str) -> String {
    let lower = name.to_lowercase().replace("dr. ", "");
    let parts: Vec<&str> = lower.split_whitespace().collect();
    match parts.as_slice() {
        [] => "unknown@institution.edu".to_string(),
        [only] => format!("{}@institution.edu", only),
        [first, .., last] => format!("{}.{}@institution.edu", first, last),
    }
}

pub fn nudge_invitation(expert: &SearchableRecord) -> NudgeInvitation {
    info!(expert = %expert.display_name, source = %expert.source, "nudge invitation created");
    NudgeInvitation {
        expert_name: expert.display_name.clone(),
        expert_email: guess_email(&expert.display_name),
        expert_institution: expert.institution_raw.clone(),
        invitation_type: "platform_join".to_string(),
        source: expert.source,
        benefits: NUDGE_BENEFITS.iter().map(|b| b.to_string()).collect(),
        call_to_action: "Join medmatch to connect with patients and researchers".to_string(),
        created_at: Utc::now(),
    }
}

pub struct AdminDesk {
    store: Arc<dyn RecordStore>,
    counter: AtomicU64,
}

impl AdminDesk {
    /// The id counter continues from the number of stored requests.
    pub fn new(store: Arc<dyn RecordStore>) -> Result<Self, MatchError> {
        let existing = store.count(Table::AdminRequests)? as u64;
        Ok(Self {
            store,
            counter: AtomicU64::new(existing),
        })
    }

    fn next_id(&self, subject: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let subject: String = subject
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();
        if subject.is_empty() {
            format!("req_{}_unknown", n)
        } else {
            format!("req_{}_{}", n, subject)
        }
    }

    fn create(&self, payload: AdminPayload) -> Result<AdminRequest, MatchError> {
        let now = Utc::now();
        let request = AdminRequest {
            id: self.next_id(payload.subject()),
            status: RequestStatus::PendingAdminReview,
            created_at: now,
            updated_at: now,
            payload,
        };
        self.store.insert(Table::AdminRequests, request.to_row()?)?;
        info!(
            id = %request.id,
            kind = request.payload.kind_str(),
            expert = request.payload.expert_name(),
            "admin request created"
        );
        Ok(request)
    }

    pub fn create_contact_request(&self, mut contact: ContactRequest) -> Result<AdminRequest, MatchError> {
        validate_email(&contact.email)?;
        contact.patient_name = sanitize_input(&contact.patient_name);
        if contact.patient_name.is_empty() {
            return Err(MatchError::InvalidInput("Patient name is required".into()));
        }
        contact.message = sanitize_input(&contact.message);
        self.create(AdminPayload::ExternalExpertContact(contact))
    }

    pub fn flag_missing_contact(&self, mut flag: MissingContactFlag) -> Result<AdminRequest, MatchError> {
        flag.expert_name = sanitize_input(&flag.expert_name);
        if flag.expert_name.is_empty() {
            return Err(MatchError::InvalidInput("Expert name is required".into()));
        }
        self.create(AdminPayload::MissingContactInfo(flag))
    }

    /// All requests, newest first.
    pub fn list_requests(&self) -> Result<Vec<AdminRequest>, MatchError> {
        let rows = self.store.select(Table::AdminRequests, &[])?;
        let mut requests: Vec<AdminRequest> = rows
            .iter()
            .filter_map(|row| {
                AdminRequest::from_row(row)
                    .map_err(|e| warn!(error = %e, "skipping malformed admin request"))
                    .ok()
            })
            .collect();
        // Later inserts win ties on the timestamp.
        requests.reverse();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    pub fn get_request(&self, id: &str) -> Result<AdminRequest, MatchError> {
        let rows = self.store.select(Table::AdminRequests, &[Filter::eq("id", id)])?;
        match rows.first() {
            Some(row) => AdminRequest::from_row(row),
            None => Err(MatchError::NotFound {
                kind: "admin request",
                id: id.to_string(),
            }),
        }
    }

    pub fn update_status(&self, id: &str, status: RequestStatus) -> Result<AdminRequest, MatchError> {
        let mut patch = Row::new();
        patch.insert("status".into(), Value::from(status.as_str()));
        patch.insert("updated_at".into(), serde_json::to_value(Utc::now())?);

        let updated = self
            .store
            .update(Table::AdminRequests, &[Filter::eq("id", id)], patch)?;
        let Some(row) = updated.first() else {
            return Err(MatchError::NotFound {
                kind: "admin request",
                id: id.to_string(),
            });
        };
        info!(id, status = status.as_str(), "admin request updated");
        AdminRequest::from_row(row)
    }

    fn is_registered(&self, researcher_id: &str) -> Result<bool, MatchError> {
        let Ok(id) = researcher_id.parse::<u64>() else {
            return Ok(false);
        };
        // Ids may be stored as numbers or numeric strings.
        let rows = self.store.select(Table::Researchers, &[])?;
        Ok(rows.iter().any(|row| row_id(row).ok() == Some(id)))
    }

    /// Send a meeting request directly to a registered local researcher, or
    /// forward it to an admin otherwise.
    pub fn route_meeting_request(&self, request: MeetingRequest) -> Result<MeetingRoute, MatchError> {
        validate_email(&request.email)?;
        let patient_name = sanitize_input(&request.patient_name);
        if patient_name.is_empty() {
            return Err(MatchError::InvalidInput("Patient name is required".into()));
        }
        let researcher_id = request.researcher_id.trim().to_string();
        if researcher_id.is_empty() {
            return Err(MatchError::InvalidInput("Researcher id is required".into()));
        }
        let message = request.message.as_deref().map(sanitize_input);

        let external = researcher_id.parse::<u64>().map(is_external_id).unwrap_or(false);
        if external || !self.is_registered(&researcher_id)? {
            let contact = ContactRequest {
                patient_name,
                email: request.email,
                phone: request.phone,
                expert_name: format!("Expert ID: {}", researcher_id),
                expert_id: researcher_id,
                expert_source: None,
                message: message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Patient requesting meeting".to_string()),
                urgency: request.urgency,
                preferred_date: request.preferred_date,
                preferred_time: request.preferred_time,
                meeting_type: Some(request.meeting_type),
            };
            let admin = self.create(AdminPayload::ExternalExpertContact(contact))?;
            return Ok(MeetingRoute::AdminRequest(admin));
        }

        let mut row = Row::new();
        row.insert("patient_name".into(), Value::from(patient_name));
        row.insert("patient_contact".into(), Value::from(request.email));
        row.insert("phone".into(), Value::from(request.phone));
        row.insert("preferred_date".into(), Value::from(request.preferred_date));
        row.insert("preferred_time".into(), Value::from(request.preferred_time));
        row.insert("meeting_type".into(), Value::from(request.meeting_type));
        row.insert("message".into(), Value::from(message));
        row.insert("urgency".into(), Value::from(request.urgency));
        row.insert("researcher_id".into(), Value::from(researcher_id.as_str()));
        row.insert("status".into(), Value::from("pending"));
        row.insert("created_at".into(), serde_json::to_value(Utc::now())?);

        let stored = self.store.insert(Table::MeetingRequests, row)?;
        info!(researcher_id = %researcher_id, "meeting request sent directly");
        Ok(MeetingRoute::DirectRequest(stored))
    }

    /// Direct meeting requests addressed to one researcher.
    pub fn meeting_requests(&self, researcher_id: &str) -> Result<Vec<Row>, MatchError> {
        Ok(self
            .store
            .select(Table::MeetingRequests, &[Filter::eq("researcher_id", researcher_id)])?)
    }
}
