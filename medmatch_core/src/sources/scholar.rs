//! Google Scholar via SerpAPI, with placeholders when no key is configured.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{placeholder_experts, str_at};
use crate::config::{MissingKeyPolicy, SourceSettings};
use crate::error::MatchError;
use crate::record::{RecordKind, SearchableRecord, Source};
use crate::utils::{check_status, clean_html_entities, doctor_name, http_client};
use crate::{RecordSource, SearchRequest};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

const INSTITUTION: &str = "Google Scholar Network";
const PLACEHOLDER_INSTITUTION: &str = "Google Scholar Institution";
const FLAVOR: &str = "Academic Publications";

pub struct ScholarSource {
    client: reqwest::Client,
    /// `None` means placeholder mode.
    api_key: Option<String>,
    url: String,
}

impl ScholarSource {
    /// A keyless source with policy `skip` is a `MissingCredential` error.
    pub fn new(settings: &SourceSettings) -> Result<Self, MatchError> {
        let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key.is_none() && settings.missing_key == MissingKeyPolicy::Skip {
            return Err(MatchError::MissingCredential("scholar (SERPAPI_KEY)".to_string()));
        }
        Ok(Self {
            client: http_client()?,
            api_key,
            url: SERPAPI_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn search(&self, key: &str, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        let params: Vec<(&str, String)> = vec![
            ("engine", "google_scholar".into()),
            ("q", format!("{} research", request.term)),
            ("num", request.limit.to_string()),
            ("api_key", key.to_string()),
        ];
        let response = self.client.get(&self.url).query(&params).send().await?;
        let body: Value = check_status("scholar", response)?.json().await?;
        Ok(experts_from_results(&request.term, &body, request.limit))
    }
}

/// Lead author of an organic result: the first structured author, or the
/// first name in the "A Author, B Author - Venue, Year" summary line.
fn lead_author(result: &Value) -> Option<String> {
    if let Some(name) = str_at(result, "/publication_info/authors/0/name") {
        return Some(name.to_string());
    }
    let summary = str_at(result, "/publication_info/summary")?;
    let authors = summary.split(" - ").next()?;
    let first = authors.split(',').next()?.trim().trim_end_matches('…').trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// Normalize a SerpAPI `google_scholar` response.
pub fn experts_from_results(term: &str, body: &Value, limit: usize) -> Vec<SearchableRecord> {
    let Some(results) = body.get("organic_results").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut records = Vec::new();
    for result in results {
        if records.len() >= limit {
            break;
        }
        let Some(author) = lead_author(result) else {
            continue;
        };
        let record = SearchableRecord::external(
            Source::Scholar,
            records.len(),
            RecordKind::Expert,
            doctor_name(&author),
        )
        .with_specialties([format!("{} Research", term)])
        .with_interests([term.to_string(), FLAVOR.to_string()])
        .with_institution(INSTITUTION)
        .with_metadata(json!({
            "publication_title": str_at(result, "/title")
                .map(clean_html_entities)
                .unwrap_or_else(|| "Research Publication".to_string()),
            "link": str_at(result, "/link"),
        }));
        records.push(record);
    }
    records
}

#[async_trait]
impl RecordSource for ScholarSource {
    fn source(&self) -> Source {
        Source::Scholar
    }

    fn description(&self) -> &'static str {
        "Google Scholar lead authors (SerpAPI)"
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Expert
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        match &self.api_key {
            Some(key) => self.search(key, request).await,
            None => Ok(placeholder_experts(
                Source::Scholar,
                "Dr. Scholar Researcher",
                PLACEHOLDER_INSTITUTION,
                FLAVOR,
                &request.term,
                request.limit,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experts_from_results() {
        let body = json!({
            "organic_results": [
                {
                    "title": "Ketamine in treatment-resistant depression &amp;amp; PTSD",
                    "link": "https://example.org/a",
                    "publication_info": {
                        "summary": "CA Zarate, JB Singh - Archives of general psychiatry, 2006",
                        "authors": [ { "name": "CA Zarate", "author_id": "x" } ]
                    }
                },
                {
                    "title": "No authors here",
                    "publication_info": {}
                },
                {
                    "title": "Summary only",
                    "publication_info": { "summary": "R Carhart-Harris, D Nutt… - Lancet, 2016" }
                }
            ]
        });
        let records = experts_from_results("depression", &body, 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_name, "Dr. CA Zarate");
        assert_eq!(
            records[0].metadata["publication_title"],
            "Ketamine in treatment-resistant depression & PTSD"
        );
        assert_eq!(records[1].display_name, "Dr. R Carhart-Harris");
        assert_eq!(records[1].id, 4001);

        assert_eq!(experts_from_results("depression", &body, 1).len(), 1);
        assert!(experts_from_results("x", &json!({}), 3).is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_without_key() {
        let source = ScholarSource::new(&SourceSettings::defaults(Source::Scholar)).unwrap();
        let records = source
            .fetch(&SearchRequest::new("adhd", RecordKind::Expert, 3))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_name, "Dr. Scholar Researcher 1");
        assert_eq!(records[0].source, Source::Scholar);
        assert_eq!(records[0].metadata["placeholder"], true);
    }

    #[test]
    fn test_skip_without_key_is_a_missing_credential() {
        let mut settings = SourceSettings::defaults(Source::Scholar);
        settings.missing_key = MissingKeyPolicy::Skip;
        let err = ScholarSource::new(&settings).err().unwrap();
        assert!(matches!(err, MatchError::MissingCredential(_)));
        assert_eq!(err.code_str(), "config_error");

        settings.api_key = Some("k".into());
        assert!(ScholarSource::new(&settings).is_ok());
    }
}
