//! External record sources.
//!
//! Each source owns its HTTP client, calls one upstream API, and normalizes
//! the response into [`SearchableRecord`]s tagged with its [`Source`].

#[cfg(feature = "clinicaltrials")]
pub mod clinical_trials;
#[cfg(feature = "orcid")]
pub mod orcid;
#[cfg(feature = "pubmed")]
pub mod pubmed;
#[cfg(feature = "researchgate")]
pub mod researchgate;
#[cfg(feature = "scholar")]
pub mod scholar;

use serde_json::{json, Value};

use crate::config::{MissingKeyPolicy, SourceSettings};
use crate::record::{RecordKind, SearchableRecord, Source};

/// Placeholder batches never exceed this many records.
pub const MAX_PLACEHOLDERS: usize = 2;

/// A keyless source is registered unless its policy is `skip`.
pub fn should_register(settings: &SourceSettings) -> bool {
    settings.enabled && (settings.has_key() || settings.missing_key == MissingKeyPolicy::Placeholder)
}

/// Clearly labelled stand-in experts for a source without credentials.
///
/// Every record carries `"placeholder": true` in its metadata.
pub fn placeholder_experts(
    source: Source,
    name_prefix: &str,
    institution: &str,
    flavor: &str,
    term: &str,
    limit: usize,
) -> Vec<SearchableRecord> {
    (0..limit.min(MAX_PLACEHOLDERS))
        .map(|i| {
            SearchableRecord::external(
                source,
                i,
                RecordKind::Expert,
                format!("{} {}", name_prefix, i + 1),
            )
            .with_specialties([format!("{} Research", term)])
            .with_interests([term.to_string(), flavor.to_string()])
            .with_institution(institution)
            .with_metadata(json!({ "placeholder": true }))
        })
        .collect()
}

/// First string of a `{"Field": ["value", ...]}` column, if non-empty.
pub(crate) fn first_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String at a JSON pointer, if non-empty.
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_capped_and_labelled() {
        let records = placeholder_experts(
            Source::Scholar,
            "Dr. Scholar Researcher",
            "Google Scholar Institution",
            "Academic Publications",
            "glioma",
            5,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].display_name, "Dr. Scholar Researcher 2");
        assert_eq!(records[1].id, 4001);
        assert_eq!(records[0].metadata["placeholder"], true);
        assert!(records.iter().all(|r| r.needs_admin_review && !r.contact_available));

        assert_eq!(
            placeholder_experts(Source::Researchgate, "x", "y", "z", "t", 1).len(),
            1
        );
    }

    #[test]
    fn test_should_register() {
        let mut settings = SourceSettings::defaults(Source::Scholar);
        assert!(should_register(&settings));
        settings.missing_key = MissingKeyPolicy::Skip;
        assert!(!should_register(&settings));
        settings.api_key = Some("k".into());
        assert!(should_register(&settings));
        settings.enabled = false;
        assert!(!should_register(&settings));
    }

    #[test]
    fn test_json_helpers() {
        let v = json!({ "BriefTitle": ["  A trial "], "Phase": [], "a": { "b": "" } });
        assert_eq!(first_str(&v, "BriefTitle"), Some("A trial"));
        assert_eq!(first_str(&v, "Phase"), None);
        assert_eq!(str_at(&v, "/a/b"), None);
    }
}
