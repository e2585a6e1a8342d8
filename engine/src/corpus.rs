//! Corpus loading.
//!
//! The `CorpusStore` holds the recorded questions in source order. A
//! record's position in the store is the position of its vector in the
//! index built from it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

/// Sentinel for classification fields missing from the source.
pub const UNKNOWN: &str = "Unknown";

/// One recorded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier assigned by the source data.
    pub id: i64,

    /// Question text.
    pub question: String,

    /// Classification domain.
    pub domain: String,

    /// Classification subdomain.
    pub subdomain: String,
}

impl Record {
    /// Create a record with `"Unknown"` classification.
    pub fn new(id: i64, question: impl Into<String>) -> Self {
        Self {
            id,
            question: question.into(),
            domain: UNKNOWN.to_string(),
            subdomain: UNKNOWN.to_string(),
        }
    }

    /// Set the domain and subdomain.
    pub fn with_classification(
        mut self,
        domain: impl Into<String>,
        subdomain: impl Into<String>,
    ) -> Self {
        self.domain = domain.into();
        self.subdomain = subdomain.into();
        self
    }
}

/// Source shape of a record; every field may be absent or null.
#[derive(Debug, Deserialize)]
struct RawRecord {
    id: Option<i64>,
    question: Option<String>,
    domain: Option<String>,
    subdomain: Option<String>,
}

impl RawRecord {
    fn into_record(self, index: usize) -> Result<Record> {
        let id = self.id.ok_or_else(|| EngineError::MalformedRecord {
            index,
            reason: "missing id".to_string(),
        })?;
        let question = self.question.ok_or_else(|| EngineError::MalformedRecord {
            index,
            reason: "missing question".to_string(),
        })?;

        Ok(Record {
            id,
            question,
            domain: self.domain.unwrap_or_else(|| UNKNOWN.to_string()),
            subdomain: self.subdomain.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}

/// Immutable, ordered collection of records.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    records: Vec<Record>,
}

impl CorpusStore {
    /// Create a store holding no records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a store from records already in memory.
    ///
    /// Records whose id was already seen are dropped with a warning.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|record| {
                let fresh = seen.insert(record.id);
                if !fresh {
                    warn!("Skipping record with duplicate id {}", record.id);
                }
                fresh
            })
            .collect();

        Self { records }
    }

    /// Parse a JSON array of records.
    ///
    /// A malformed top-level document is an error; a malformed entry is
    /// logged and skipped.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(text)?;
        let total = entries.len();

        let records: Vec<Record> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| {
                let parsed = serde_json::from_value::<RawRecord>(value)
                    .map_err(|e| EngineError::MalformedRecord {
                        index,
                        reason: e.to_string(),
                    })
                    .and_then(|raw| raw.into_record(index));
                match parsed {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping corpus entry: {e}");
                        None
                    }
                }
            })
            .collect();

        let store = Self::from_records(records);
        if store.len() != total {
            warn!("Kept {} of {total} corpus entries", store.len());
        }
        Ok(store)
    }

    /// Load records from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::CorpusLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let store = Self::from_json_str(&text).map_err(|e| EngineError::CorpusLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        info!("Loaded {} questions from {}", store.len(), path.display());
        Ok(store)
    }

    /// Load records from a JSON file, falling back to an empty store.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("{e}; continuing with an empty corpus");
                Self::empty()
            }
        }
    }

    /// Return the first candidate path that exists.
    pub fn resolve(candidates: &[PathBuf]) -> Option<&Path> {
        candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    /// Load from the first existing candidate, or return an empty store.
    pub fn load_first(candidates: &[PathBuf]) -> Self {
        match Self::resolve(candidates) {
            Some(path) => Self::load_or_empty(path),
            None => {
                warn!("Questions file not found in {candidates:?}, using empty corpus");
                Self::empty()
            }
        }
    }

    /// Get the record at a position.
    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    /// All records in load order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Question texts in load order.
    pub fn questions(&self) -> Vec<String> {
        self.records.iter().map(|r| r.question.clone()).collect()
    }

    /// Get the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults_classification() {
        let store = CorpusStore::from_json_str(
            r#"[
                {"id": 1, "question": "What is 2+2?", "domain": "Arithmetic"},
                {"id": 2, "question": "Define a prime.", "domain": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().domain, "Arithmetic");
        assert_eq!(store.get(0).unwrap().subdomain, UNKNOWN);
        assert_eq!(store.get(1).unwrap().domain, UNKNOWN);
    }

    #[test]
    fn test_skips_malformed_entries_and_keeps_order() {
        let store = CorpusStore::from_json_str(
            r#"[
                {"id": 3, "question": "c"},
                {"question": "no id"},
                {"id": 4},
                {"id": "five", "question": "bad id"},
                {"id": 1, "question": "a"}
            ]"#,
        )
        .unwrap();

        let ids: Vec<i64> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let store = CorpusStore::from_records(vec![
            Record::new(1, "first"),
            Record::new(1, "second"),
            Record::new(2, "third"),
        ]);

        assert_eq!(store.questions(), vec!["first", "third"]);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(CorpusStore::from_json_str("{\"id\": 1}").is_err());
    }

    #[test]
    fn test_load_missing_file_is_soft() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("question.json");

        assert!(matches!(
            CorpusStore::load(&missing),
            Err(EngineError::CorpusLoad { .. })
        ));
        assert!(CorpusStore::load_or_empty(&missing).is_empty());
    }

    #[test]
    fn test_load_first_picks_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let mut file = NamedTempFile::new_in(dir.path()).unwrap();
        write!(file, r#"[{{"id": 7, "question": "Solve x+1=2"}}]"#).unwrap();

        let candidates = vec![dir.path().join("missing.json"), file.path().to_path_buf()];
        let store = CorpusStore::load_first(&candidates);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap().id, 7);
    }

    #[test]
    fn test_load_first_without_candidates() {
        let dir = TempDir::new().unwrap();
        let store = CorpusStore::load_first(&[dir.path().join("nothing.json")]);
        assert!(store.is_empty());
    }
}
