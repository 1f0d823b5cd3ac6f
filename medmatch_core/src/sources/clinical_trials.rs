//! Trial registry (ClinicalTrials.gov `study_fields` query).
//!
//! One endpoint serves two record kinds: principal investigators (experts)
//! and the studies themselves (trials).

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::first_str;
use crate::config::SourceSettings;
use crate::error::MatchError;
use crate::record::{RecordKind, SearchableRecord, Source};
use crate::utils::{check_status, doctor_name, http_client, truncate_snippet};
use crate::{RecordSource, SearchRequest};

const STUDY_FIELDS_URL: &str = "https://clinicaltrials.gov/api/query/study_fields";

const INVESTIGATOR_FIELDS: &str = "LeadSponsorName,OverallOfficialName,OverallOfficialAffiliation";
const STUDY_FIELDS: &str = "NCTId,BriefTitle,Phase,OverallStatus,LocationCountry,BriefSummary";

#[derive(Clone)]
pub struct ClinicalTrialsSource {
    client: reqwest::Client,
    url: String,
}

impl ClinicalTrialsSource {
    pub fn new(_settings: &SourceSettings) -> Result<Self, MatchError> {
        Ok(Self {
            client: http_client()?,
            url: STUDY_FIELDS_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn study_fields(&self, expr: &str, fields: &str, limit: usize) -> Result<Value, MatchError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("expr", expr.to_string()),
                ("fields", fields.to_string()),
                ("min_rnk", "1".to_string()),
                ("max_rnk", (limit * 2).max(1).to_string()),
                ("fmt", "json".to_string()),
            ])
            .send()
            .await?;
        Ok(check_status("clinicaltrials", response)?.json().await?)
    }
}

/// Rows of a `StudyFieldsResponse`.
pub fn study_rows(body: &Value) -> &[Value] {
    body.pointer("/StudyFieldsResponse/StudyFields")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// One expert per study: its first overall official.
pub fn investigators_from_studies(term: &str, studies: &[Value], limit: usize) -> Vec<SearchableRecord> {
    let mut records = Vec::new();
    for study in studies.iter().take(limit) {
        let Some(official) = first_str(study, "OverallOfficialName") else {
            continue;
        };
        let affiliation =
            first_str(study, "OverallOfficialAffiliation").unwrap_or("Clinical Research Institution");
        let record = SearchableRecord::external(
            Source::Clinicaltrials,
            records.len(),
            RecordKind::Expert,
            doctor_name(official),
        )
        .with_specialties([format!("{} Clinical Research", term)])
        .with_interests([term.to_string(), "Clinical Trials".to_string()])
        .with_institution(affiliation)
        .with_metadata(json!({ "lead_sponsor": first_str(study, "LeadSponsorName") }));
        records.push(record);
    }
    records
}

/// One trial per study, with registry placeholders for missing columns.
pub fn trials_from_studies(term: &str, studies: &[Value], limit: usize) -> Vec<SearchableRecord> {
    studies
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, study)| {
            let title = first_str(study, "BriefTitle")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Clinical Trial for {}", term));
            let description = first_str(study, "BriefSummary")
                .map(|s| truncate_snippet(s, 200))
                .unwrap_or_else(|| format!("Clinical trial studying {}", term));
            SearchableRecord::external(Source::Clinicaltrials, index, RecordKind::Trial, title)
                .with_specialties([term.to_string()])
                .with_interests([description])
                .with_institution(first_str(study, "LocationCountry").unwrap_or("Multiple Locations"))
                .with_metadata(json!({
                    "nct_id": first_str(study, "NCTId"),
                    "phase": first_str(study, "Phase").unwrap_or("Phase Unknown"),
                    "status": first_str(study, "OverallStatus").unwrap_or("Status Unknown"),
                }))
        })
        .collect()
}

#[async_trait]
impl RecordSource for ClinicalTrialsSource {
    fn source(&self) -> Source {
        Source::Clinicaltrials
    }

    fn description(&self) -> &'static str {
        "ClinicalTrials.gov studies and their principal investigators"
    }

    fn supports(&self, kind: RecordKind) -> bool {
        matches!(kind, RecordKind::Expert | RecordKind::Trial)
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        match request.kind {
            RecordKind::Expert => {
                let body = self
                    .study_fields(&request.term, INVESTIGATOR_FIELDS, request.limit)
                    .await?;
                Ok(investigators_from_studies(&request.term, study_rows(&body), request.limit))
            }
            RecordKind::Trial => {
                // Studies are queried by the first word of the term only.
                let expr = request.term.split_whitespace().next().unwrap_or_default();
                let body = self.study_fields(expr, STUDY_FIELDS, request.limit).await?;
                let rows = study_rows(&body);
                debug!(expr, rows = rows.len(), "clinicaltrials: studies");
                Ok(trials_from_studies(&request.term, rows, request.limit))
            }
            RecordKind::Collaborator => Ok(Vec::new()),
        }
    }
}
