//! Cross-source duplicate suppression.

use serde::{Deserialize, Serialize};

use crate::record::SearchableRecord;

/// How two normalized names are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeStrategy {
    /// Identical normalized keys only.
    Exact,
    /// Identical keys, or one key entirely contained in the other.
    #[default]
    Containment,
}

impl DedupeStrategy {
    fn is_duplicate(&self, candidate: &str, accepted: &str) -> bool {
        if candidate == accepted {
            return true;
        }
        match self {
            DedupeStrategy::Exact => false,
            DedupeStrategy::Containment => {
                !candidate.is_empty()
                    && !accepted.is_empty()
                    && (accepted.contains(candidate) || candidate.contains(accepted))
            }
        }
    }
}

/// Drop external records whose normalized name duplicates a record from a
/// higher-priority source (or an earlier record of the same priority).
///
/// Local records are always kept and are accepted before anything else, so
/// input order never decides whether a local record survives. Output keeps
/// the input order of the surviving records. Records with an empty name are
/// never treated as duplicates.
pub fn dedupe(records: Vec<SearchableRecord>, strategy: DedupeStrategy) -> Vec<SearchableRecord> {
    let keys: Vec<String> = records.iter().map(|r| r.normalized_key()).collect();

    // Visit order: by source priority, then input position.
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by_key(|&i| (records[i].source.priority(), i));

    let mut accepted: Vec<&str> = Vec::new();
    let mut keep = vec![false; records.len()];

    for i in order {
        let key = keys[i].as_str();
        if records[i].source.is_local() {
            keep[i] = true;
            if !key.is_empty() {
                accepted.push(key);
            }
            continue;
        }
        if key.is_empty() {
            keep[i] = true;
            continue;
        }
        if accepted.iter().any(|seen| strategy.is_duplicate(key, seen)) {
            tracing::debug!(source = %records[i].source, name = %records[i].display_name, "dropping duplicate");
            continue;
        }
        keep[i] = true;
        accepted.push(key);
    }

    records
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordKind, Source};

    fn ext(source: Source, index: usize, name: &str) -> SearchableRecord {
        SearchableRecord::external(source, index, RecordKind::Expert, name)
    }

    fn local(id: u64, name: &str) -> SearchableRecord {
        SearchableRecord::local(id, RecordKind::Expert, name, true)
    }

    fn ids(records: &[SearchableRecord]) -> Vec<u64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_first_priority_survives() {
        let out = dedupe(
            vec![
                ext(Source::Pubmed, 0, "Dr. Jane Smith"),
                ext(Source::Orcid, 0, "  dr. jane smith "),
            ],
            DedupeStrategy::Exact,
        );
        assert_eq!(ids(&out), vec![1000]);
    }

    #[test]
    fn test_priority_beats_input_order() {
        let out = dedupe(
            vec![
                ext(Source::Scholar, 0, "Dr. Jane Smith"),
                ext(Source::Pubmed, 0, "Dr. Jane Smith"),
            ],
            DedupeStrategy::Exact,
        );
        assert_eq!(ids(&out), vec![1000]);
    }

    #[test]
    fn test_local_never_removed() {
        let out = dedupe(
            vec![
                ext(Source::Pubmed, 0, "Dr. Jane Smith"),
                local(1, "Dr. Jane Smith"),
                local(2, "Dr. Jane Smith"),
            ],
            DedupeStrategy::Containment,
        );
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn test_containment_drops_substring_titles() {
        let out = dedupe(
            vec![
                local(1, "DCIS Vaccine Trial for Women"),
                ext(Source::Clinicaltrials, 0, "DCIS Vaccine Trial"),
                ext(Source::Clinicaltrials, 1, "Glioma Proteomics"),
            ],
            DedupeStrategy::Containment,
        );
        assert_eq!(ids(&out), vec![1, 3001]);

        let exact = dedupe(
            vec![
                local(1, "DCIS Vaccine Trial for Women"),
                ext(Source::Clinicaltrials, 0, "DCIS Vaccine Trial"),
            ],
            DedupeStrategy::Exact,
        );
        assert_eq!(exact.len(), 2);
    }

    #[test]
    fn test_empty_names_are_kept() {
        // An empty key never matches and never becomes a seen key; under
        // containment it would otherwise swallow every later record.
        for strategy in [DedupeStrategy::Exact, DedupeStrategy::Containment] {
            let out = dedupe(
                vec![
                    local(1, ""),
                    ext(Source::Pubmed, 0, ""),
                    ext(Source::Orcid, 0, "   "),
                    ext(Source::Orcid, 1, "Dr. Li Wei"),
                ],
                strategy,
            );
            assert_eq!(ids(&out), vec![1, 1000, 2000, 2001], "{:?}", strategy);
        }
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            ext(Source::Researchgate, 0, "Dr. RG Researcher 1"),
            local(4, "Dr. Ana Gomez"),
            ext(Source::Pubmed, 0, "Dr. Ana Gomez"),
            ext(Source::Orcid, 0, "Dr. Li Wei"),
            ext(Source::Scholar, 0, "Dr. Li Wei Chen"),
            ext(Source::Scholar, 1, "Dr. Scholar Researcher 1"),
        ];
        for strategy in [DedupeStrategy::Exact, DedupeStrategy::Containment] {
            let once = dedupe(input.clone(), strategy);
            let twice = dedupe(once.clone(), strategy);
            assert_eq!(once, twice);
        }
    }
}
