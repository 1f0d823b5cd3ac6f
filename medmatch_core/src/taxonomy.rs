//! Term taxonomy.
//!
//! A fixed, ordered table of condition families. A query activates a family
//! when it contains one of the family's trigger keywords; the family's
//! related terms are then used to widen matching beyond literal substrings.
//! Evaluation order is the table order and the first activated family wins.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MatchError;

/// One condition family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyBucket {
    pub name: String,
    /// Keywords that activate the bucket when found inside the query.
    pub triggers: Vec<String>,
    /// Terms that make a record related to the query.
    pub related: Vec<String>,
}

impl TaxonomyBucket {
    pub fn new(name: &str, triggers: &[&str], related: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            related: related.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `query` must already be lower-cased.
    pub fn is_triggered_by(&self, query: &str) -> bool {
        self.triggers.iter().any(|t| query.contains(t.as_str()))
    }

    /// Whether any related term occurs in `text` (compared lower-cased).
    pub fn relates_to(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.related.iter().any(|t| text.contains(t.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermTaxonomy {
    pub buckets: Vec<TaxonomyBucket>,
}

static BUILTIN: Lazy<TermTaxonomy> = Lazy::new(|| TermTaxonomy {
    buckets: vec![
        TaxonomyBucket::new(
            "breast-cancer",
            &["ductal", "carcinoma", "dcis", "breast"],
            &[
                "breast cancer",
                "breast",
                "oncology",
                "ductal carcinoma",
                "dcis",
                "vaccine",
            ],
        ),
        TaxonomyBucket::new(
            "pediatric-neurology",
            &["pediatric neurology", "pediatric neurosurgery", "epilepsy"],
            &[
                "pediatric neurology",
                "pediatric neurosurgery",
                "movement disorders",
                "epilepsy",
            ],
        ),
        TaxonomyBucket::new(
            "parkinsons",
            &["parkinson", "movement", "deep brain"],
            &[
                "parkinson",
                "movement disorders",
                "neurology",
                "deep brain stimulation",
                "dbs",
                "gait",
                "freezing",
            ],
        ),
        TaxonomyBucket::new(
            "adhd",
            &[
                "adhd",
                "attention-deficit",
                "neurofeedback",
                "methylphenidate",
                "medication response",
            ],
            &[
                "adhd",
                "attention-deficit",
                "neurofeedback",
                "child psychiatry",
                "neuroimaging",
                "methylphenidate",
                "medication response",
                "netherlands",
                "amsterdam",
            ],
        ),
        TaxonomyBucket::new(
            "depression",
            &[
                "depression",
                "depressive",
                "brain stimulation",
                "ketamine",
                "psilocybin",
                "tms",
                "neuroimaging",
                "netherlands",
                "amsterdam",
            ],
            &[
                "depression",
                "psychiatry",
                "brain stimulation",
                "deep brain stimulation",
                "treatment-resistant",
                "ketamine",
                "psilocybin",
                "tms",
                "neuroimaging",
                "clinical psychology",
                "cognitive therapy",
                "long-term outcomes",
                "netherlands",
                "amsterdam",
            ],
        ),
        TaxonomyBucket::new(
            "glioma",
            &["glioma", "bevacizumab", "radiotherapy", "proteomics", "recurrent"],
            &[
                "glioma",
                "recurrent glioma",
                "bevacizumab",
                "radiotherapy",
                "proteomics",
                "cancer research",
                "chemical biology",
                "drug discovery",
            ],
        ),
        TaxonomyBucket::new(
            "dopamine-modulation",
            &["dopamine", "modulation"],
            &["dopamine", "modulation", "adhd", "amsterdam"],
        ),
        TaxonomyBucket::new(
            "long-term-outcomes",
            &["long-term", "outcomes", "treatment"],
            &["long-term", "outcomes", "treatment", "depression"],
        ),
    ],
});

impl TermTaxonomy {
    /// The curated table shipped with the crate.
    pub fn builtin() -> &'static TermTaxonomy {
        &BUILTIN
    }

    pub fn empty() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    /// Load a replacement table from YAML (`buckets: [{name, triggers, related}]`).
    pub fn from_yaml(content: &str) -> Result<Self, MatchError> {
        let mut taxonomy: TermTaxonomy = serde_yaml::from_str(content)?;
        for bucket in &mut taxonomy.buckets {
            bucket.triggers.iter_mut().for_each(|t| *t = t.to_lowercase());
            bucket.related.iter_mut().for_each(|t| *t = t.to_lowercase());
        }
        Ok(taxonomy)
    }

    pub fn from_path(path: &Path) -> Result<Self, MatchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Every bucket activated by `query`, in evaluation order.
    pub fn buckets_for(&self, query: &str) -> Vec<&TaxonomyBucket> {
        let query = query.to_lowercase();
        self.buckets
            .iter()
            .filter(|b| b.is_triggered_by(&query))
            .collect()
    }

    /// The bucket used for matching: the first activated one.
    pub fn primary_bucket(&self, query: &str) -> Option<&TaxonomyBucket> {
        let query = query.to_lowercase();
        self.buckets.iter().find(|b| b.is_triggered_by(&query))
    }

    pub fn get(&self, name: &str) -> Option<&TaxonomyBucket> {
        self.buckets.iter().find(|b| b.name == name)
    }
}

impl Default for TermTaxonomy {
    fn default() -> Self {
        BUILTIN.clone()
    }
}
