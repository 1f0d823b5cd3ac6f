//! The common record shape every source normalizes into.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Location shown when an institution string carries no embedded location.
pub const UNKNOWN_LOCATION: &str = "Various Locations";

/// Provenance of a record.
///
/// Variant order is the deduplication and assembly priority: local first,
/// then registry sources, then scraped and placeholder sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Local,
    Pubmed,
    Orcid,
    Clinicaltrials,
    Scholar,
    Researchgate,
    MockFallback,
}

impl Source {
    /// All sources in priority order.
    pub const ALL: [Source; 7] = [
        Source::Local,
        Source::Pubmed,
        Source::Orcid,
        Source::Clinicaltrials,
        Source::Scholar,
        Source::Researchgate,
        Source::MockFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Pubmed => "pubmed",
            Source::Orcid => "orcid",
            Source::Clinicaltrials => "clinicaltrials",
            Source::Scholar => "scholar",
            Source::Researchgate => "researchgate",
            Source::MockFallback => "mock-fallback",
        }
    }

    /// Human-readable label used in output.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Local => "Platform Profile",
            Source::Pubmed => "PubMed",
            Source::Orcid => "ORCID",
            Source::Clinicaltrials => "ClinicalTrials.gov",
            Source::Scholar => "Google Scholar",
            Source::Researchgate => "ResearchGate",
            Source::MockFallback => "Fallback",
        }
    }

    pub fn parse(tag: &str) -> Option<Source> {
        Source::ALL.iter().copied().find(|s| s.as_str() == tag)
    }

    /// Lower value sorts first.
    pub fn priority(&self) -> usize {
        *self as usize
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Source::Local)
    }

    /// First id of the reserved range for this source. Local ids are not
    /// offset.
    pub fn id_offset(&self) -> u64 {
        match self {
            Source::Local => 0,
            Source::Pubmed => 1000,
            Source::Orcid => 2000,
            Source::Clinicaltrials => 3000,
            Source::Scholar => 4000,
            Source::Researchgate => 5000,
            Source::MockFallback => 9000,
        }
    }

    /// Deterministic id for the record at `index` within one response batch.
    pub fn external_id(&self, index: usize) -> u64 {
        self.id_offset() + index as u64
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Smallest id of any reserved external range.
pub const EXTERNAL_ID_FLOOR: u64 = 1000;

/// Width of each reserved external id range.
pub const ID_RANGE_SIZE: u64 = 1000;

/// Largest per-source limit whose batch indices stay inside one id range.
pub const MAX_SOURCE_LIMIT: usize = (ID_RANGE_SIZE - 1) as usize;

/// Whether an id falls inside one of the reserved external ranges.
pub fn is_external_id(id: u64) -> bool {
    id >= EXTERNAL_ID_FLOOR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Expert,
    Trial,
    Collaborator,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Expert => "expert",
            RecordKind::Trial => "trial",
            RecordKind::Collaborator => "collaborator",
        }
    }
}

/// A normalized expert, trial or collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableRecord {
    pub id: u64,
    pub kind: RecordKind,
    pub display_name: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub institution_raw: String,
    pub source: Source,
    pub contact_available: bool,
    pub needs_admin_review: bool,
    /// Source-specific fields (DOI, ORCID id, phase, ...).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl SearchableRecord {
    /// A record read from the local store.
    pub fn local(
        id: u64,
        kind: RecordKind,
        display_name: impl Into<String>,
        contact_available: bool,
    ) -> Self {
        Self {
            id,
            kind,
            display_name: display_name.into(),
            specialties: Vec::new(),
            interests: Vec::new(),
            institution_raw: String::new(),
            source: Source::Local,
            contact_available,
            needs_admin_review: false,
            metadata: Value::Null,
        }
    }

    /// A record produced by an external source. Never directly contactable.
    pub fn external(
        source: Source,
        index: usize,
        kind: RecordKind,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: source.external_id(index),
            kind,
            display_name: display_name.into(),
            specialties: Vec::new(),
            interests: Vec::new(),
            institution_raw: String::new(),
            source,
            contact_available: false,
            needs_admin_review: !source.is_local(),
            metadata: Value::Null,
        }
    }

    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = specialties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution_raw = institution.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Institution name without any embedded location.
    pub fn institution_name(&self) -> &str {
        match self.institution_raw.split_once(", ") {
            Some((name, _)) => name,
            None => &self.institution_raw,
        }
    }

    /// Location embedded after the first `", "` of the institution string.
    pub fn location(&self) -> &str {
        match self.institution_raw.split_once(", ") {
            Some((_, location)) if !location.is_empty() => location,
            _ => UNKNOWN_LOCATION,
        }
    }

    /// First specialty, or "General".
    pub fn primary_specialty(&self) -> &str {
        self.specialties
            .first()
            .map(String::as_str)
            .unwrap_or("General")
    }

    /// Key used for cross-source duplicate detection.
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.display_name)
    }
}

/// Case-folded, whitespace-trimmed form of a title or name.
pub fn normalize_key(text: &str) -> String {
    text.trim().to_lowercase()
}
