//! ResearchGate has no public API; this source only produces labelled
//! placeholder experts.

use async_trait::async_trait;

use super::placeholder_experts;
use crate::config::{MissingKeyPolicy, SourceSettings};
use crate::error::MatchError;
use crate::record::{RecordKind, SearchableRecord, Source};
use crate::{RecordSource, SearchRequest};

pub struct ResearchGateSource {
    policy: MissingKeyPolicy,
}

impl ResearchGateSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            policy: settings.missing_key,
        }
    }
}

#[async_trait]
impl RecordSource for ResearchGateSource {
    fn source(&self) -> Source {
        Source::Researchgate
    }

    fn description(&self) -> &'static str {
        "ResearchGate network (placeholder results)"
    }

    fn supports(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Expert
    }

    async fn fetch(&self, request: &SearchRequest) -> Result<Vec<SearchableRecord>, MatchError> {
        if self.policy == MissingKeyPolicy::Skip {
            return Ok(Vec::new());
        }
        Ok(placeholder_experts(
            Source::Researchgate,
            "Dr. RG Researcher",
            "ResearchGate Network",
            "Collaborative Research",
            &request.term,
            request.limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholders() {
        let source = ResearchGateSource::new(&SourceSettings::defaults(Source::Researchgate));
        let records = source
            .fetch(&SearchRequest::new("parkinson", RecordKind::Expert, 5))
            .await
            .unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["Dr. RG Researcher 1", "Dr. RG Researcher 2"]);
        assert_eq!(records[1].id, 5001);
        assert_eq!(records[0].interests, vec!["parkinson", "Collaborative Research"]);
    }
}
