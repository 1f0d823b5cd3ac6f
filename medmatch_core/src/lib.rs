// src/lib.rs
pub mod admin;
pub mod aggregator;
pub mod assembler;
pub mod assistant;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod matcher;
pub mod record;
pub mod seed;
pub mod sources;
pub mod store;
pub mod taxonomy;
pub mod utils;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::admin::AdminDesk;
pub use crate::aggregator::{SearchEngine, SearchOptions, SearchOutcome, SourceReport};
pub use crate::assistant::Assistant;
pub use crate::config::AppConfig;
pub use crate::error::MatchError;
pub use crate::record::{RecordKind, SearchableRecord, Source};
pub use crate::store::RecordStore;

/// One query against one external source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub term: String,
    pub kind: RecordKind,
    /// Upper bound on records the source should return.
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(term: impl Into<String>, kind: RecordKind, limit: usize) -> Self {
        Self {
            term: term.into(),
            kind,
            limit,
        }
    }
}

/// An upstream that produces normalized records.
///
/// Implementations make a single attempt per call and report failures as
/// `Err`; the aggregator turns those into an empty contribution.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Provenance tag stamped on every record this source returns.
    fn source(&self) -> Source;

    fn description(&self) -> &'static str;

    /// Record kinds this source can produce.
    fn supports(&self, kind: RecordKind) -> bool;

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source: Source,
    pub description: String,
    pub kinds: Vec<RecordKind>,
}

/// External sources, kept in priority order.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source, replacing any source with the same tag.
    pub fn register(&mut self, source: Arc<dyn RecordSource>) {
        let tag = source.source();
        self.sources.retain(|s| s.source() != tag);
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.source().priority());
    }

    pub fn with(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, tag: Source) -> Option<&Arc<dyn RecordSource>> {
        self.sources.iter().find(|s| s.source() == tag)
    }

    /// Sources able to produce `kind`, in priority order.
    pub fn sources_for(&self, kind: RecordKind) -> Vec<Arc<dyn RecordSource>> {
        self.sources
            .iter()
            .filter(|s| s.supports(kind))
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .map(|s| SourceInfo {
                source: s.source(),
                description: s.description().to_string(),
                kinds: [RecordKind::Expert, RecordKind::Trial, RecordKind::Collaborator]
                    .into_iter()
                    .filter(|k| s.supports(*k))
                    .collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Build a registry with every source compiled in and enabled by `config`.
/// Sources whose credential is missing and whose policy is `skip` are left
/// out.
pub fn build_registry(config: &AppConfig) -> Result<SourceRegistry, MatchError> {
    #[allow(unused_mut)]
    let mut registry = SourceRegistry::new();

    #[cfg(feature = "pubmed")]
    {
        let settings = config.source(Source::Pubmed);
        if settings.enabled {
            registry.register(Arc::new(sources::pubmed::PubMedSource::new(&settings)?));
        }
    }

    #[cfg(feature = "orcid")]
    {
        let settings = config.source(Source::Orcid);
        if settings.enabled {
            registry.register(Arc::new(sources::orcid::OrcidSource::new(&settings)?));
        }
    }

    #[cfg(feature = "clinicaltrials")]
    {
        let settings = config.source(Source::Clinicaltrials);
        if settings.enabled {
            registry.register(Arc::new(
                sources::clinical_trials::ClinicalTrialsSource::new(&settings)?,
            ));
        }
    }

    #[cfg(feature = "scholar")]
    {
        let settings = config.source(Source::Scholar);
        if sources::should_register(&settings) {
            registry.register(Arc::new(sources::scholar::ScholarSource::new(&settings)?));
        }
    }

    #[cfg(feature = "researchgate")]
    {
        let settings = config.source(Source::Researchgate);
        if sources::should_register(&settings) {
            registry.register(Arc::new(sources::researchgate::ResearchGateSource::new(
                &settings,
            )));
        }
    }

    tracing::debug!(sources = registry.len(), "source registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Source);

    #[async_trait]
    impl RecordSource for Fixed {
        fn source(&self) -> Source {
            self.0
        }
        fn description(&self) -> &'static str {
            "fixed"
        }
        fn supports(&self, kind: RecordKind) -> bool {
            kind == RecordKind::Expert
        }
        async fn fetch(&self, _: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_registry_keeps_priority_order() {
        let registry = SourceRegistry::new()
            .with(Arc::new(Fixed(Source::Scholar)))
            .with(Arc::new(Fixed(Source::Pubmed)))
            .with(Arc::new(Fixed(Source::Orcid)))
            .with(Arc::new(Fixed(Source::Pubmed)));
        let order: Vec<Source> = registry.list().iter().map(|s| s.source).collect();
        assert_eq!(order, vec![Source::Pubmed, Source::Orcid, Source::Scholar]);
        assert!(registry.sources_for(RecordKind::Trial).is_empty());
        assert_eq!(registry.sources_for(RecordKind::Expert).len(), 3);
    }

    #[cfg(all(feature = "scholar", feature = "researchgate", feature = "pubmed"))]
    #[test]
    fn test_build_registry_respects_config() {
        let config = AppConfig::from_toml(
            r#"
[sources.pubmed]
enabled = false

[sources.researchgate]
missing_key = "skip"
"#,
        )
        .unwrap();
        let registry = build_registry(&config).unwrap();
        assert!(registry.get(Source::Pubmed).is_none());
        assert!(registry.get(Source::Researchgate).is_none());
        // no key, placeholder policy: still registered
        assert!(registry.get(Source::Scholar).is_some());
    }
}
