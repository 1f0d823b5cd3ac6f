//! Final result assembly: per-source truncation, then priority concatenation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::{SearchableRecord, Source};

/// Per-source caps on how many records a source may contribute.
/// A source without an entry is unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLimits {
    #[serde(flatten)]
    limits: HashMap<Source, usize>,
}

impl SourceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Source, limit: usize) -> Self {
        self.limits.insert(source, limit);
        self
    }

    pub fn set(&mut self, source: Source, limit: usize) {
        self.limits.insert(source, limit);
    }

    pub fn limit_for(&self, source: Source) -> Option<usize> {
        self.limits.get(&source).copied()
    }
}

/// Records contributed by one source, in upstream response order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    pub source: Source,
    pub records: Vec<SearchableRecord>,
}

impl SourceBatch {
    pub fn new(source: Source, records: Vec<SearchableRecord>) -> Self {
        Self { source, records }
    }
}

/// Concatenate batches in source priority order, truncating each batch to
/// its limit first. No reordering happens inside a batch.
pub fn assemble(mut batches: Vec<SourceBatch>, limits: &SourceLimits) -> Vec<SearchableRecord> {
    // Stable: batches of equal priority keep their relative order.
    batches.sort_by_key(|b| b.source.priority());

    let mut out = Vec::new();
    for batch in batches {
        let take = limits.limit_for(batch.source).unwrap_or(usize::MAX);
        out.extend(batch.records.into_iter().take(take));
    }
    out
}

/// Split a flat list back into per-source batches, preserving order.
pub fn regroup(records: Vec<SearchableRecord>) -> Vec<SourceBatch> {
    let mut batches: Vec<SourceBatch> = Vec::new();
    for record in records {
        match batches.iter_mut().find(|b| b.source == record.source) {
            Some(batch) => batch.records.push(record),
            None => batches.push(SourceBatch::new(record.source, vec![record])),
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    fn batch(source: Source, n: usize) -> SourceBatch {
        SourceBatch::new(
            source,
            (0..n)
                .map(|i| {
                    SearchableRecord::external(source, i, RecordKind::Expert, format!("{source} {i}"))
                })
                .collect(),
        )
    }

    #[test]
    fn test_priority_order_and_truncation() {
        let limits = SourceLimits::new()
            .with(Source::Pubmed, 2)
            .with(Source::Orcid, 1);
        let out = assemble(
            vec![batch(Source::Orcid, 3), batch(Source::Pubmed, 5)],
            &limits,
        );
        let ids: Vec<u64> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1000, 1001, 2000]);
    }

    #[test]
    fn test_truncation_is_per_source_not_global() {
        let limits = SourceLimits::new()
            .with(Source::Pubmed, 1)
            .with(Source::Scholar, 1);
        let out = assemble(
            vec![batch(Source::Pubmed, 3), batch(Source::Scholar, 3)],
            &limits,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].source, Source::Scholar);
    }

    #[test]
    fn test_unlimited_source() {
        let out = assemble(vec![batch(Source::Local, 0), batch(Source::Pubmed, 4)], &SourceLimits::new());
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_regroup_preserves_order() {
        let flat = assemble(
            vec![batch(Source::Pubmed, 2), batch(Source::Orcid, 1)],
            &SourceLimits::new(),
        );
        let groups = regroup(flat);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source, Source::Pubmed);
        assert_eq!(groups[0].records[1].id, 1001);
    }
}
