//! Seeding the local store from a JSON file.
//!
//! ```json
//! { "researchers": [ { "name": "...", "specialties": [...] } ], "trials": [ ... ] }
//! ```
//!
//! Rows whose `name` (researchers) or `title` (trials) already exists are
//! skipped, so reseeding the same file is harmless.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::MatchError;
use crate::store::{Filter, RecordStore, Row, Table};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub researchers: Vec<Row>,
    #[serde(default)]
    pub trials: Vec<Row>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub researchers: usize,
    pub trials: usize,
    pub skipped: usize,
}

impl SeedFile {
    pub fn from_json(content: &str) -> Result<Self, MatchError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, MatchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn apply(&self, store: &dyn RecordStore) -> Result<SeedSummary, MatchError> {
        let mut summary = SeedSummary::default();
        for row in &self.researchers {
            if seed_row(store, Table::Researchers, "name", row)? {
                summary.researchers += 1;
            } else {
                summary.skipped += 1;
            }
        }
        for row in &self.trials {
            if seed_row(store, Table::Trials, "title", row)? {
                summary.trials += 1;
            } else {
                summary.skipped += 1;
            }
        }
        info!(
            researchers = summary.researchers,
            trials = summary.trials,
            skipped = summary.skipped,
            "seeded store"
        );
        Ok(summary)
    }
}

fn seed_row(store: &dyn RecordStore, table: Table, key: &str, row: &Row) -> Result<bool, MatchError> {
    let Some(value) = row.get(key).and_then(Value::as_str).filter(|v| !v.trim().is_empty()) else {
        return Err(MatchError::InvalidInput(format!(
            "{} row is missing '{}'",
            table.as_str(),
            key
        )));
    };
    if !store.select(table, &[Filter::eq(key, value)])?.is_empty() {
        debug!(table = table.as_str(), key = value, "already seeded");
        return Ok(false);
    }
    store.insert(table, row.clone())?;
    Ok(true)
}
