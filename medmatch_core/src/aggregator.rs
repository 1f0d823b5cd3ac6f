//! Search pipeline.
//!
//! Local store first (filtered by the matcher), then a concurrent fan-out
//! to the external sources that can produce the requested kind. Each
//! source runs under its own deadline and its own accumulator; a failing
//! or slow source contributes nothing and is reported, never raised.
//! Results are deduplicated, then assembled by source priority with
//! per-source truncation.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::assembler::{assemble, regroup, SourceLimits};
use crate::config::{AppConfig, DEFAULT_TIMEOUT_MS};
use crate::dedupe::{dedupe, DedupeStrategy};
use crate::error::MatchError;
use crate::matcher::filter_records;
use crate::record::{RecordKind, SearchableRecord, Source, MAX_SOURCE_LIMIT};
use crate::store::{researcher_from_row, trial_from_row, RecordStore, Table};
use crate::taxonomy::TermTaxonomy;
use crate::{RecordSource, SearchRequest, SourceRegistry};

/// Limit used for a source with no configured limit.
pub const FALLBACK_SOURCE_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub include_external: bool,
    pub limits: SourceLimits,
    /// Hard deadline for each external call.
    pub timeout: Duration,
    pub dedupe: DedupeStrategy,
    pub fallback_when_empty: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_external: false,
            limits: AppConfig::default().limits(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            dedupe: DedupeStrategy::default(),
            fallback_when_empty: false,
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            include_external: false,
            limits: config.limits(),
            timeout: Duration::from_millis(config.search.timeout_ms),
            dedupe: config.search.dedupe,
            fallback_when_empty: config.search.fallback_when_empty,
        }
    }

    pub fn with_external(mut self, include_external: bool) -> Self {
        self.include_external = include_external;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Limits are capped at `MAX_SOURCE_LIMIT` so ids stay in their range.
    pub fn with_limit(mut self, source: Source, limit: usize) -> Self {
        self.limits.set(source, limit.min(MAX_SOURCE_LIMIT));
        self
    }

    fn limit_for(&self, source: Source) -> usize {
        self.limits
            .limit_for(source)
            .unwrap_or(FALLBACK_SOURCE_LIMIT)
            .min(MAX_SOURCE_LIMIT)
    }
}

/// What one source contributed to a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: Source,
    /// Records returned before deduplication and truncation.
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub is_timeout: bool,
    pub duration_ms: u64,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub query: String,
    pub kind: RecordKind,
    pub records: Vec<SearchableRecord>,
    pub reports: Vec<SourceReport>,
    /// True when at least one source failed or timed out.
    #[serde(default)]
    pub partial: bool,
    pub duration_ms: u64,
}

impl SearchOutcome {
    pub fn failed_sources(&self) -> Vec<Source> {
        self.reports
            .iter()
            .filter(|r| !r.is_ok())
            .map(|r| r.source)
            .collect()
    }
}

/// Runs searches against one store and one source registry.
pub struct SearchEngine {
    store: Arc<dyn RecordStore>,
    registry: SourceRegistry,
    taxonomy: TermTaxonomy,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn RecordStore>, registry: SourceRegistry) -> Self {
        Self {
            store,
            registry,
            taxonomy: TermTaxonomy::default(),
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: TermTaxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub async fn search_experts(&self, term: &str, opts: &SearchOptions) -> Result<SearchOutcome, MatchError> {
        self.search(RecordKind::Expert, term, opts).await
    }

    pub async fn search_trials(&self, term: &str, opts: &SearchOptions) -> Result<SearchOutcome, MatchError> {
        self.search(RecordKind::Trial, term, opts).await
    }

    pub async fn search_collaborators(
        &self,
        term: &str,
        opts: &SearchOptions,
    ) -> Result<SearchOutcome, MatchError> {
        self.search(RecordKind::Collaborator, term, opts).await
    }

    /// Search one record kind.
    ///
    /// Only a local store failure is returned as `Err`; external failures
    /// show up in `reports`.
    pub async fn search(
        &self,
        kind: RecordKind,
        term: &str,
        opts: &SearchOptions,
    ) -> Result<SearchOutcome, MatchError> {
        let start = Instant::now();
        let term = term.trim();

        let local_start = Instant::now();
        let local = self.local_records(kind, term)?;
        let mut reports = vec![SourceReport {
            source: Source::Local,
            count: local.len(),
            error: None,
            is_timeout: false,
            duration_ms: local_start.elapsed().as_millis() as u64,
        }];

        let mut all = local;
        if opts.include_external && !term.is_empty() {
            let sources = self.registry.sources_for(kind);
            let fetched = fan_out(&sources, kind, term, opts).await;
            for (report, records) in fetched {
                reports.push(report);
                all.extend(records);
            }
        }

        let before = all.len();
        let deduped = dedupe(all, opts.dedupe);
        debug!(term, removed = before - deduped.len(), "dedupe");

        let mut records = assemble(regroup(deduped), &opts.limits);

        if records.is_empty() && kind == RecordKind::Trial && !term.is_empty() && opts.fallback_when_empty {
            records.push(mock_fallback_trial(term));
        }

        let partial = reports.iter().any(|r| !r.is_ok());
        info!(
            term,
            kind = kind.as_str(),
            results = records.len(),
            partial,
            "search complete"
        );

        Ok(SearchOutcome {
            query: term.to_string(),
            kind,
            records,
            reports,
            partial,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn local_records(&self, kind: RecordKind, term: &str) -> Result<Vec<SearchableRecord>, MatchError> {
        let table = match kind {
            RecordKind::Trial => Table::Trials,
            RecordKind::Expert | RecordKind::Collaborator => Table::Researchers,
        };
        let rows = self.store.select(table, &[])?;

        let records: Vec<SearchableRecord> = rows
            .iter()
            .filter_map(|row| {
                let converted = match kind {
                    RecordKind::Trial => trial_from_row(row),
                    _ => researcher_from_row(row, kind),
                };
                converted
                    .map_err(|e| warn!(table = table.as_str(), error = %e, "skipping row"))
                    .ok()
            })
            .collect();

        Ok(filter_records(term, records, &self.taxonomy))
    }
}

/// Query every source concurrently. Output order follows `sources`.
async fn fan_out(
    sources: &[Arc<dyn RecordSource>],
    kind: RecordKind,
    term: &str,
    opts: &SearchOptions,
) -> Vec<(SourceReport, Vec<SearchableRecord>)> {
    let futures: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let tag = source.source();
            let request = SearchRequest::new(term, kind, opts.limit_for(tag));
            let deadline = opts.timeout;

            async move {
                let start = Instant::now();
                let outcome = timeout(deadline, source.fetch(&request)).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (records, error, is_timeout) = match outcome {
                    Ok(Ok(records)) => (normalize_external(tag, records), None, false),
                    Ok(Err(e)) => {
                        warn!(source = %tag, error = %e, "source failed");
                        (Vec::new(), Some(e.to_string()), false)
                    }
                    Err(_) => {
                        warn!(source = %tag, timeout_ms = deadline.as_millis() as u64, "source timed out");
                        (
                            Vec::new(),
                            Some(format!("timeout after {}ms", deadline.as_millis())),
                            true,
                        )
                    }
                };

                let report = SourceReport {
                    source: tag,
                    count: records.len(),
                    error,
                    is_timeout,
                    duration_ms,
                };
                (report, records)
            }
        })
        .collect();

    futures::future::join_all(futures).await
}

/// Keep only records carrying the source's own tag, with external contact
/// flags.
fn normalize_external(tag: Source, records: Vec<SearchableRecord>) -> Vec<SearchableRecord> {
    records
        .into_iter()
        .filter(|r| {
            let own = r.source == tag;
            if !own {
                debug!(source = %tag, record_source = %r.source, "dropping mistagged record");
            }
            own
        })
        .map(|mut r| {
            r.contact_available = false;
            r.needs_admin_review = true;
            r
        })
        .collect()
}

/// The single stand-in returned for an empty trial search.
pub fn mock_fallback_trial(term: &str) -> SearchableRecord {
    SearchableRecord::external(
        Source::MockFallback,
        0,
        RecordKind::Trial,
        format!("Clinical Trial for {}", term),
    )
    .with_specialties([term.to_string()])
    .with_interests([format!("Clinical trial studying treatments for {}.", term)])
    .with_institution("Multiple Locations")
    .with_metadata(json!({ "phase": "Phase II", "status": "Recruiting" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Canned {
        tag: Source,
        names: Vec<&'static str>,
    }

    #[async_trait]
    impl RecordSource for Canned {
        fn source(&self) -> Source {
            self.tag
        }
        fn description(&self) -> &'static str {
            "canned"
        }
        fn supports(&self, kind: RecordKind) -> bool {
            kind == RecordKind::Expert
        }
        async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
            Ok(self
                .names
                .iter()
                .take(request.limit)
                .enumerate()
                .map(|(i, n)| SearchableRecord::external(self.tag, i, RecordKind::Expert, *n))
                .collect())
        }
    }

    fn row(value: Value) -> crate::store::Row {
        value.as_object().cloned().unwrap()
    }

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(
            MemoryStore::with_rows([
                (
                    Table::Researchers,
                    row(json!({
                        "id": 1,
                        "name": "Dr. Sarah Johnson",
                        "specialties": ["Oncology"],
                        "research_interests": ["Ductal Carcinoma in Situ"],
                        "institution": "Johns Hopkins, Baltimore, USA",
                        "available_for_meetings": true
                    })),
                ),
                (
                    Table::Researchers,
                    row(json!({
                        "id": 2,
                        "name": "Dr. Pieter Bakker",
                        "specialties": ["Child Psychiatry"],
                        "research_interests": ["ADHD"],
                        "institution": "Amsterdam UMC, Amsterdam, Netherlands",
                        "available_for_meetings": false
                    })),
                ),
            ])
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_local_only_search() {
        let engine = SearchEngine::new(store(), SourceRegistry::new());
        let out = engine
            .search_experts("breast cancer", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].display_name, "Dr. Sarah Johnson");
        assert!(!out.partial);
        assert_eq!(out.reports.len(), 1);
    }

    #[tokio::test]
    async fn test_external_merged_after_local() {
        let registry = SourceRegistry::new()
            .with(Arc::new(Canned {
                tag: Source::Orcid,
                names: vec!["Dr. Li Wei", "Dr. Ana Gomez", "Dr. Extra"],
            }))
            .with(Arc::new(Canned {
                tag: Source::Pubmed,
                names: vec!["Dr. Ana Gomez", "Dr. Pieter Bakker"],
            }));
        let engine = SearchEngine::new(store(), registry);
        let opts = SearchOptions::default()
            .with_external(true)
            .with_limit(Source::Orcid, 2);
        let out = engine.search_experts("adhd", &opts).await.unwrap();

        let names: Vec<&str> = out.records.iter().map(|r| r.display_name.as_str()).collect();
        // PubMed's Bakker duplicates the local row; ORCID's Gomez duplicates PubMed's.
        assert_eq!(names, vec!["Dr. Pieter Bakker", "Dr. Ana Gomez", "Dr. Li Wei"]);
        assert_eq!(out.reports.len(), 3);
        assert_eq!(out.reports[1].source, Source::Pubmed);
    }

    #[tokio::test]
    async fn test_empty_term_skips_external() {
        let registry = SourceRegistry::new().with(Arc::new(Canned {
            tag: Source::Pubmed,
            names: vec!["Dr. X"],
        }));
        let engine = SearchEngine::new(store(), registry);
        let out = engine
            .search_experts("  ", &SearchOptions::default().with_external(true))
            .await
            .unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.reports.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_fallback_for_empty_trial_search() {
        let engine = SearchEngine::new(store(), SourceRegistry::new());
        let mut opts = SearchOptions::default();
        let out = engine.search_trials("glioma", &opts).await.unwrap();
        assert!(out.records.is_empty());

        opts.fallback_when_empty = true;
        let out = engine.search_trials("glioma", &opts).await.unwrap();
        assert_eq!(out.records.len(), 1);
        let mock = &out.records[0];
        assert_eq!(mock.source, Source::MockFallback);
        assert_eq!(mock.display_name, "Clinical Trial for glioma");
        assert!(mock.needs_admin_review && !mock.contact_available);

        // never for an empty term
        let out = engine.search_trials("", &opts).await.unwrap();
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_options_from_config() {
        let config = AppConfig::from_toml("[search]\ntimeout_ms = 50\n[sources.pubmed]\nlimit = 7\n").unwrap();
        let opts = SearchOptions::from_config(&config);
        assert_eq!(opts.timeout, Duration::from_millis(50));
        assert_eq!(opts.limit_for(Source::Pubmed), 7);
        assert_eq!(opts.limit_for(Source::Local), FALLBACK_SOURCE_LIMIT);
        assert!(!opts.include_external);
    }

    #[test]
    fn test_limits_are_capped_to_the_id_range() {
        let opts = SearchOptions::default().with_limit(Source::Pubmed, 1500);
        assert_eq!(opts.limit_for(Source::Pubmed), MAX_SOURCE_LIMIT);
        assert_eq!(opts.limits.limit_for(Source::Pubmed), Some(MAX_SOURCE_LIMIT));
        let last = Source::Pubmed.external_id(opts.limit_for(Source::Pubmed) - 1);
        assert!(last < Source::Orcid.id_offset());
    }
}
