//! Record matching: direct substring hits first, taxonomy-related hits second.

use serde::{Deserialize, Serialize};

use crate::record::SearchableRecord;
use crate::taxonomy::TermTaxonomy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    None,
    Direct,
    Related,
}

impl MatchKind {
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchKind::None)
    }
}

/// Decide how `record` relates to `query`.
///
/// An empty (or all-whitespace) query matches everything directly.
pub fn match_record(query: &str, record: &SearchableRecord, taxonomy: &TermTaxonomy) -> MatchKind {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return MatchKind::Direct;
    }

    if is_direct(&term, record) {
        return MatchKind::Direct;
    }

    match taxonomy.primary_bucket(&term) {
        Some(bucket) if related_fields(record).any(|text| bucket.relates_to(text)) => {
            MatchKind::Related
        }
        _ => MatchKind::None,
    }
}

fn is_direct(term: &str, record: &SearchableRecord) -> bool {
    std::iter::once(record.display_name.as_str())
        .chain(related_fields(record))
        .any(|text| text.to_lowercase().contains(term))
}

/// Specialties, interests and the institution string.
fn related_fields(record: &SearchableRecord) -> impl Iterator<Item = &str> {
    record
        .specialties
        .iter()
        .chain(record.interests.iter())
        .map(String::as_str)
        .chain(std::iter::once(record.institution_raw.as_str()))
}

/// Keep the records that match `query`, preserving order. Each record
/// appears at most once regardless of how it matched.
pub fn filter_records(
    query: &str,
    records: Vec<SearchableRecord>,
    taxonomy: &TermTaxonomy,
) -> Vec<SearchableRecord> {
    records
        .into_iter()
        .filter(|r| match_record(query, r, taxonomy).is_match())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    fn oncologist() -> SearchableRecord {
        SearchableRecord::local(1, RecordKind::Expert, "Dr. Sarah Johnson", true)
            .with_specialties(["Oncology"])
            .with_interests(["Ductal Carcinoma in Situ"])
            .with_institution("Johns Hopkins, Baltimore, USA")
    }

    #[test]
    fn test_direct_match_on_each_field() {
        let tax = TermTaxonomy::builtin();
        let r = oncologist();
        assert_eq!(match_record("sarah", &r, tax), MatchKind::Direct);
        assert_eq!(match_record("ONCOLOGY", &r, tax), MatchKind::Direct);
        assert_eq!(match_record("in situ", &r, tax), MatchKind::Direct);
        assert_eq!(match_record("baltimore", &r, tax), MatchKind::Direct);
    }

    #[test]
    fn test_related_match_through_taxonomy() {
        let tax = TermTaxonomy::builtin();
        assert_eq!(
            match_record("breast cancer", &oncologist(), tax),
            MatchKind::Related
        );
    }

    #[test]
    fn test_direct_takes_precedence() {
        let tax = TermTaxonomy::builtin();
        // "dcis" is both literal in the record and a breast-cancer related term.
        let r = oncologist().with_interests(["DCIS screening"]);
        assert_eq!(match_record("dcis", &r, tax), MatchKind::Direct);
    }

    #[test]
    fn test_direct_match_needs_no_bucket() {
        let tax = TermTaxonomy::builtin();
        let r = SearchableRecord::local(2, RecordKind::Expert, "Dr. Lee", true)
            .with_specialties(["Dermatology"]);
        assert_eq!(match_record("dermatology", &r, tax), MatchKind::Direct);
        assert_eq!(match_record("cardiology", &r, tax), MatchKind::None);
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let tax = TermTaxonomy::builtin();
        let r = SearchableRecord::local(3, RecordKind::Trial, "", false);
        assert_eq!(match_record("", &r, tax), MatchKind::Direct);
        assert_eq!(match_record("   ", &r, tax), MatchKind::Direct);
    }

    #[test]
    fn test_related_match_on_institution() {
        let tax = TermTaxonomy::builtin();
        let r = SearchableRecord::local(4, RecordKind::Expert, "Dr. de Vries", true)
            .with_specialties(["Neurology"])
            .with_institution("Amsterdam UMC, Amsterdam, Netherlands");
        assert_eq!(match_record("ketamine", &r, tax), MatchKind::Related);
    }

    #[test]
    fn test_filter_keeps_each_record_once() {
        let tax = TermTaxonomy::builtin();
        let kept = filter_records(
            "breast cancer",
            vec![
                oncologist(),
                SearchableRecord::local(9, RecordKind::Expert, "Dr. Kim", true)
                    .with_specialties(["Cardiology"]),
            ],
            tax,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }
}
