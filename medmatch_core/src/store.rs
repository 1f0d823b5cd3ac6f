//! Local record store.
//!
//! A table-like row store with equality and substring filters. Rows are
//! JSON objects. Two backends share the same contract: an in-memory store
//! for tests and development, and a JSON-file store. The backend is chosen
//! at startup from configuration and handed to whoever needs it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::record::{RecordKind, SearchableRecord};

pub type Row = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("persist error: {0}")]
    Persist(String),
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Researchers,
    Trials,
    AdminRequests,
    MeetingRequests,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Researchers,
        Table::Trials,
        Table::AdminRequests,
        Table::MeetingRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Researchers => "researchers",
            Table::Trials => "trials",
            Table::AdminRequests => "admin_requests",
            Table::MeetingRequests => "meeting_requests",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value exactly.
    Eq(String, Value),
    /// Case-insensitive substring of a string field, or of any string in an
    /// array field.
    Contains(String, String),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Filter::Contains(field.to_string(), needle.to_lowercase())
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(field, value) => row.get(field) == Some(value),
            Filter::Contains(field, needle) => match row.get(field) {
                Some(Value::String(s)) => s.to_lowercase().contains(needle.as_str()),
                Some(Value::Array(items)) => items.iter().any(|v| {
                    v.as_str()
                        .map(|s| s.to_lowercase().contains(needle.as_str()))
                        .unwrap_or(false)
                }),
                _ => false,
            },
        }
    }
}

pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching every filter, in insertion order.
    fn select(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;

    /// Insert a row. Rows without an `id` get the next integer id.
    fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Merge `patch` into every matching row; returns the updated rows.
    fn update(&self, table: Table, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError>;

    fn count(&self, table: Table) -> Result<usize, StoreError> {
        Ok(self.select(table, &[])?.len())
    }
}

type Tables = HashMap<String, Vec<Row>>;

fn select_from(tables: &Tables, table: Table, filters: &[Filter]) -> Vec<Row> {
    tables
        .get(table.as_str())
        .map(|rows| {
            rows.iter()
                .filter(|row| filters.iter().all(|f| f.matches(row)))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn insert_into(tables: &mut Tables, table: Table, mut row: Row) -> Row {
    let rows = tables.entry(table.as_str().to_string()).or_default();
    if !row.contains_key("id") {
        let next = rows
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_u64))
            .max()
            .unwrap_or(0)
            + 1;
        row.insert("id".to_string(), Value::from(next));
    }
    rows.push(row.clone());
    row
}

fn update_in(tables: &mut Tables, table: Table, filters: &[Filter], patch: &Row) -> Vec<Row> {
    let mut updated = Vec::new();
    if let Some(rows) = tables.get_mut(table.as_str()) {
        for row in rows
            .iter_mut()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
        {
            for (k, v) in patch {
                row.insert(k.clone(), v.clone());
            }
            updated.push(row.clone());
        }
    }
    updated
}

/// In-memory store.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Build a store pre-populated with rows.
    pub fn with_rows(rows: impl IntoIterator<Item = (Table, Row)>) -> Result<Self, StoreError> {
        let store = Self::new();
        for (table, row) in rows {
            store.insert(table, row)?;
        }
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn select(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        Ok(select_from(&*self.lock()?, table, filters))
    }

    fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        Ok(insert_into(&mut *self.lock()?, table, row))
    }

    fn update(&self, table: Table, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError> {
        Ok(update_in(&mut *self.lock()?, table, filters, &patch))
    }
}

/// JSON-file store: `{"researchers": [...], "trials": [...], ...}`.
///
/// Every operation re-reads the file; writes are serialized in-process.
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// `$XDG_DATA_HOME/medmatch/store.json`, or `./store.json`.
    pub fn new_default() -> Self {
        let base = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("medmatch").join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_tables(&self) -> Result<Tables, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Unavailable(format!("serde: {}", e)))
    }

    fn write_tables(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Persist(e.to_string()))?;
        }
        let s = serde_json::to_string_pretty(tables)
            .map_err(|e| StoreError::Persist(format!("serde: {}", e)))?;
        std::fs::write(&self.path, s).map_err(|e| StoreError::Persist(e.to_string()))
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;
        f()
    }
}

impl RecordStore for FileStore {
    fn select(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.with_lock(|| Ok(select_from(&self.read_tables()?, table, filters)))
    }

    fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        self.with_lock(|| {
            let mut tables = self.read_tables()?;
            let row = insert_into(&mut tables, table, row);
            self.write_tables(&tables)?;
            Ok(row)
        })
    }

    fn update(&self, table: Table, filters: &[Filter], patch: Row) -> Result<Vec<Row>, StoreError> {
        self.with_lock(|| {
            let mut tables = self.read_tables()?;
            let updated = update_in(&mut tables, table, filters, &patch);
            if !updated.is_empty() {
                self.write_tables(&tables)?;
            }
            Ok(updated)
        })
    }
}

// ---------------------------------------------------------------------------
// Row -> record conversion
// ---------------------------------------------------------------------------

fn str_field(row: &Row, field: &str) -> String {
    row.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn list_field(row: &Row, field: &str) -> Vec<String> {
    row.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Integer id of a row, accepting numeric strings.
pub fn row_id(row: &Row) -> Result<u64, StoreError> {
    match row.get("id") {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| StoreError::InvalidRow(format!("id {} is not a positive integer", n))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| StoreError::InvalidRow(format!("id {:?} is not numeric", s))),
        _ => Err(StoreError::InvalidRow("missing id".into())),
    }
}

/// A researcher row as an expert or collaborator record.
pub fn researcher_from_row(row: &Row, kind: RecordKind) -> Result<SearchableRecord, StoreError> {
    let available = row
        .get("available_for_meetings")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let mut record = SearchableRecord::local(row_id(row)?, kind, str_field(row, "name"), available)
        .with_specialties(list_field(row, "specialties"))
        .with_interests(list_field(row, "research_interests"))
        .with_institution(str_field(row, "institution"));
    if let Some(orcid) = row.get("orcid_id").filter(|v| !v.is_null()) {
        record = record.with_metadata(serde_json::json!({ "orcid_id": orcid }));
    }
    Ok(record)
}

/// A trial row as a trial record. Local trials are never directly
/// contactable; `available_for_meetings` does not apply to them.
pub fn trial_from_row(row: &Row) -> Result<SearchableRecord, StoreError> {
    let description = str_field(row, "description");
    let interests: Vec<String> = if description.is_empty() {
        Vec::new()
    } else {
        vec![description]
    };
    Ok(
        SearchableRecord::local(row_id(row)?, RecordKind::Trial, str_field(row, "title"), false)
            .with_specialties(list_field(row, "conditions"))
            .with_interests(interests)
            .with_institution(str_field(row, "location"))
            .with_metadata(serde_json::json!({
                "phase": row.get("phase"),
                "status": row.get("status"),
            })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn exercise(store: &dyn RecordStore) {
        let a = store
            .insert(
                Table::Researchers,
                row(json!({"name": "Dr. A", "specialties": ["Oncology"]})),
            )
            .unwrap();
        assert_eq!(a["id"], 1);
        store
            .insert(
                Table::Researchers,
                row(json!({"name": "Dr. B", "specialties": ["Neurology"]})),
            )
            .unwrap();

        let hits = store
            .select(
                Table::Researchers,
                &[Filter::contains("specialties", "onco")],
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["name"], "Dr. A");

        let updated = store
            .update(
                Table::Researchers,
                &[Filter::eq("id", 2)],
                row(json!({"available_for_meetings": false})),
            )
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(store.count(Table::Researchers).unwrap(), 2);
        assert_eq!(store.count(Table::Trials).unwrap(), 0);
    }

    #[test]
    fn test_memory_store_crud() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_crud_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        exercise(&FileStore::new(&path));

        let reopened = FileStore::new(&path);
        let rows = reopened
            .select(Table::Researchers, &[Filter::eq("id", 2)])
            .unwrap();
        assert_eq!(rows[0]["available_for_meetings"], false);
    }

    #[test]
    fn test_researcher_row_conversion() {
        let r = researcher_from_row(
            &row(json!({
                "id": 3,
                "name": "Dr. C",
                "specialties": ["Psychiatry"],
                "research_interests": ["Depression"],
                "institution": "Amsterdam UMC, Amsterdam, Netherlands",
                "available_for_meetings": false
            })),
            RecordKind::Expert,
        )
        .unwrap();
        assert_eq!(r.id, 3);
        assert!(!r.contact_available);
        assert!(!r.needs_admin_review);
        assert_eq!(r.location(), "Amsterdam, Netherlands");
    }

    #[test]
    fn test_trial_row_conversion() {
        let t = trial_from_row(&row(json!({
            "id": "12",
            "title": "DCIS Vaccine Study",
            "description": "A vaccine for ductal carcinoma in situ",
            "phase": "Phase II",
            "status": "Recruiting",
            "location": "Boston, USA"
        })))
        .unwrap();
        assert_eq!(t.id, 12);
        assert_eq!(t.interests.len(), 1);
        assert_eq!(t.metadata["phase"], "Phase II");
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let err = researcher_from_row(&row(json!({"name": "x"})), RecordKind::Expert).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow(_)));
    }
}
