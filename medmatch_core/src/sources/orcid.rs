//! Researcher-identity registry (ORCID public API v3.0).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::str_at;
use crate::config::SourceSettings;
use crate::error::MatchError;
use crate::record::{RecordKind, SearchableRecord, Source};
use crate::utils::{check_status, clean_html_entities, http_client, validate_orcid_id};
use crate::{RecordSource, SearchRequest};

const ORCID_BASE: &str = "https://pub.orcid.org/v3.0";

/// Works fetched in detail by a profile sync.
pub const MAX_SYNCED_WORKS: usize = 5;

const FALLBACK_NAME: &str = "Unknown Researcher";
const FALLBACK_INSTITUTION: &str = "ORCID Verified Institution";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidPublication {
    pub title: String,
    pub journal: String,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doi: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidProfile {
    pub orcid_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    pub verified: bool,
    pub publications: Vec<OrcidPublication>,
}

#[derive(Clone)]
pub struct OrcidSource {
    client: reqwest::Client,
    headers: HeaderMap,
    base_url: String,
}

impl OrcidSource {
    pub fn new(settings: &SourceSettings) -> Result<Self, MatchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| MatchError::Config(format!("invalid ORCID credential: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Self {
            client: http_client()?,
            headers,
            base_url: ORCID_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(&self, path: &str) -> Result<Value, MatchError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .headers(self.headers.clone())
            .send()
            .await?;
        Ok(check_status("orcid", response)?.json().await?)
    }

    async fn search_ids(&self, term: &str, rows: usize) -> Result<Vec<String>, MatchError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .headers(self.headers.clone())
            .query(&[("q", format!("keyword:{}", term)), ("rows", rows.to_string())])
            .send()
            .await?;
        let body: Value = check_status("orcid", response)?.json().await?;
        Ok(parse_search_ids(&body))
    }

    /// Fetch a researcher's profile and up to five publications.
    ///
    /// The id is validated before any request is made.
    pub async fn sync(&self, orcid_id: &str) -> Result<OrcidProfile, MatchError> {
        validate_orcid_id(orcid_id)?;

        let response = self
            .client
            .get(format!("{}/{}/person", self.base_url, orcid_id))
            .headers(self.headers.clone())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(MatchError::NotFound {
                kind: "ORCID profile",
                id: orcid_id.to_string(),
            });
        }
        let person: Value = check_status("orcid", response)?.json().await?;

        let name = match person_name(&person) {
            (Some(given), Some(family)) => format!("{} {}", given, family),
            (Some(only), None) | (None, Some(only)) => only.to_string(),
            (None, None) => "ORCID Researcher".to_string(),
        };

        let institution = match self.get_json(&format!("{}/employments", orcid_id)).await {
            Ok(employments) => latest_employment(&employments),
            Err(e) => {
                debug!(orcid_id, error = %e, "orcid: employments unavailable");
                None
            }
        };

        let publications = self.publications(orcid_id).await;

        Ok(OrcidProfile {
            orcid_id: orcid_id.to_string(),
            name,
            institution,
            verified: true,
            publications,
        })
    }

    /// Works are best effort: a failed listing yields no publications and a
    /// failed detail fetch skips that work.
    async fn publications(&self, orcid_id: &str) -> Vec<OrcidPublication> {
        let works = match self.get_json(&format!("{}/works", orcid_id)).await {
            Ok(works) => works,
            Err(e) => {
                warn!(orcid_id, error = %e, "orcid: works listing failed");
                return Vec::new();
            }
        };

        let mut publications = Vec::new();
        for put_code in work_put_codes(&works).into_iter().take(MAX_SYNCED_WORKS) {
            match self.get_json(&format!("{}/work/{}", orcid_id, put_code)).await {
                Ok(detail) => {
                    if let Some(publication) = parse_work(&detail) {
                        publications.push(publication);
                    }
                }
                Err(e) => debug!(orcid_id, put_code, error = %e, "orcid: work detail failed"),
            }
        }
        publications
    }
}

#[async_trait]
impl RecordSource for OrcidSource {
    fn source(&self) -> Source {
        Source::Orcid
    }

    fn description(&self) -> &'static str {
        "ORCID researchers with a matching keyword"
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Expert
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        let ids = self.search_ids(&request.term, request.limit).await?;
        debug!(term = %request.term, found = ids.len(), "orcid: search");

        let mut records = Vec::new();
        for (index, orcid_id) in ids.iter().take(request.limit).enumerate() {
            let record = self.get_json(&format!("{}/record", orcid_id)).await?;
            records.push(expert_from_record(&request.term, index, orcid_id, &record));
        }
        Ok(records)
    }
}

/// Identifiers from a `/search` response.
pub fn parse_search_ids(body: &Value) -> Vec<String> {
    body.get("result")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| str_at(r, "/orcid-identifier/path"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn person_name(person: &Value) -> (Option<&str>, Option<&str>) {
    (
        str_at(person, "/name/given-names/value"),
        str_at(person, "/name/family-name/value"),
    )
}

/// The most recent employment as `"Org, City, Country"`.
///
/// Accepts either an `/employments` document or the
/// `activities-summary/employments` part of a `/record`.
pub fn latest_employment(employments: &Value) -> Option<String> {
    let summary = employments
        .get("affiliation-group")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|group| group.get("summaries").and_then(Value::as_array))
        .flatten()
        .find_map(|s| s.get("employment-summary"))?;

    let org = str_at(summary, "/organization/name")?;
    let parts: Vec<&str> = [
        Some(org),
        str_at(summary, "/organization/address/city"),
        str_at(summary, "/organization/address/country"),
    ]
    .into_iter()
    .flatten()
    .collect();
    Some(parts.join(", "))
}

/// Normalize one `/record` document.
pub fn expert_from_record(term: &str, index: usize, orcid_id: &str, record: &Value) -> SearchableRecord {
    let person = record.get("person").unwrap_or(&Value::Null);
    let name = match person_name(person) {
        (Some(given), Some(family)) => format!("Dr. {} {}", given, family),
        _ => FALLBACK_NAME.to_string(),
    };
    let institution = record
        .pointer("/activities-summary/employments")
        .and_then(latest_employment)
        .unwrap_or_else(|| FALLBACK_INSTITUTION.to_string());

    SearchableRecord::external(Source::Orcid, index, RecordKind::Expert, name)
        .with_specialties([format!("{} Research", term)])
        .with_interests([term.to_string(), "Academic Research".to_string()])
        .with_institution(institution)
        .with_metadata(json!({ "orcid_id": orcid_id }))
}

/// Put-codes of the preferred summary in each work group.
pub fn work_put_codes(works: &Value) -> Vec<u64> {
    works
        .get("group")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|g| g.pointer("/work-summary/0/put-code"))
                .filter_map(Value::as_u64)
                .collect()
        })
        .unwrap_or_default()
}

fn date_part(work: &Value, pointer: &str, default: &str) -> String {
    let raw = str_at(work, pointer).unwrap_or(default);
    if raw.len() < 2 {
        format!("{:0>2}", raw)
    } else {
        raw.to_string()
    }
}

/// Normalize one `/work/{put-code}` document. Works without a title are
/// dropped.
pub fn parse_work(work: &Value) -> Option<OrcidPublication> {
    let title = clean_html_entities(str_at(work, "/title/title/value")?);
    let journal = str_at(work, "/journal-title/value")
        .unwrap_or("Academic Journal")
        .to_string();

    let date = if work.get("publication-date").is_some_and(|d| !d.is_null()) {
        format!(
            "{}-{}-{}",
            str_at(work, "/publication-date/year/value").unwrap_or("2024"),
            date_part(work, "/publication-date/month/value", "01"),
            date_part(work, "/publication-date/day/value", "01"),
        )
    } else {
        "2024-01-01".to_string()
    };

    let doi = work
        .pointer("/external-ids/external-id")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter()
                .find(|id| id.get("external-id-type").and_then(Value::as_str) == Some("doi"))
        })
        .and_then(|id| str_at(id, "/external-id-value"))
        .unwrap_or_default()
        .to_string();

    Some(OrcidPublication {
        title,
        journal,
        date,
        doi,
    })
}
