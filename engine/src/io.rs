//! Contracts for the producers and consumers around the engine.
//!
//! The core never reads or writes anything itself: an [`Extract`] hands it
//! a [`Table`], a [`Load`] takes one away and reports a [`LoadResult`].
//! Retry and backoff, when needed, live in those implementations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{EngineError, EngineResult, SourceError};
use crate::models::Table;

/// Outcome of a load. `success` is true iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub row_count: usize,
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl LoadResult {
    pub fn ok(row_count: usize) -> Self {
        Self {
            row_count,
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
            ..Default::default()
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.success = false;
        self
    }

    pub fn with_duration(mut self, started: Instant) -> Self {
        self.duration = Some(started.elapsed().as_secs_f64());
        self
    }
}

/// Source of a table.
pub trait Extract {
    type Error: std::error::Error;

    fn extract(&mut self) -> Result<Table, Self::Error>;
}

/// Destination for a table.
pub trait Load {
    fn load(&mut self, table: &Table) -> LoadResult;
}

/// Extractor over in-memory JSON records.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    records: Vec<Value>,
}

impl MemoryExtractor {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }
}

impl Extract for MemoryExtractor {
    type Error = EngineError;

    fn extract(&mut self) -> EngineResult<Table> {
        Table::from_records(&self.records)
    }
}

/// Loader that keeps every loaded row in memory.
///
/// When built with [`MemoryLoader::expecting`], tables whose header differs
/// are rejected.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    expected: Option<Vec<String>>,
    loaded: Vec<Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expecting<S: AsRef<str>>(header: &[S]) -> Self {
        Self {
            expected: Some(header.iter().map(|s| s.as_ref().to_string()).collect()),
            loaded: Vec::new(),
        }
    }

    /// Every row loaded so far, as JSON records.
    pub fn records(&self) -> &[Value] {
        &self.loaded
    }
}

impl Load for MemoryLoader {
    fn load(&mut self, table: &Table) -> LoadResult {
        let started = Instant::now();

        if let Some(expected) = &self.expected {
            if expected.as_slice() != table.header() {
                return LoadResult::failed(vec![format!(
                    "header mismatch: expected {:?}, got {:?}",
                    expected,
                    table.header()
                )])
                .with_duration(started);
            }
        }

        let mut result = LoadResult::ok(table.len());
        if table.is_empty() {
            result = result.with_warning("table has no rows");
        }
        self.loaded.extend(table.to_records());
        result.with_duration(started)
    }
}

/// Extractor over a file holding a JSON array of records.
#[derive(Debug, Clone)]
pub struct JsonFileExtractor {
    path: PathBuf,
}

impl JsonFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Extract for JsonFileExtractor {
    type Error = SourceError;

    fn extract(&mut self) -> Result<Table, SourceError> {
        let content = fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&content)?;
        let records = value
            .as_array()
            .ok_or_else(|| SourceError::NotRecords(self.path.display().to_string()))?;
        Ok(Table::from_records(records)?)
    }
}

/// Loader that writes the table as a pretty-printed JSON array of records.
/// Each load replaces the file.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, table: &Table) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(&table.to_records())?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Load for JsonFileLoader {
    fn load(&mut self, table: &Table) -> LoadResult {
        let started = Instant::now();
        match self.write(table) {
            Ok(()) => LoadResult::ok(table.len()).with_duration(started),
            Err(e) => LoadResult::failed(vec![format!("{}: {}", self.path.display(), e)]).with_duration(started),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use serde_json::json;

    #[test]
    fn test_extract_then_load() {
        let mut source = MemoryExtractor::new(vec![json!({ "id": 1 }), json!({ "id": 2 })]);
        let table = source.extract().unwrap();
        assert_eq!(table.column("id").unwrap(), vec![Cell::Int(1), Cell::Int(2)]);

        let mut sink = MemoryLoader::new();
        let result = sink.load(&table);
        assert!(result.success);
        assert_eq!(result.row_count, 2);
        assert!(result.duration.is_some());
        assert_eq!(sink.records(), &[json!({ "id": 1 }), json!({ "id": 2 })]);
    }

    #[test]
    fn test_extract_rejects_non_objects() {
        let mut source = MemoryExtractor::new(vec![json!([1, 2])]);
        assert!(matches!(source.extract(), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_loader_rejects_other_header() {
        let mut sink = MemoryLoader::expecting(&["id", "name"]);
        let table = Table::from_rows(&["id"], vec![vec![Cell::Int(1)]]);
        let result = sink.load(&table);
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");

        let table = Table::from_rows(
            &["id", "name"],
            vec![vec![Cell::Int(1), Cell::from("Ann")], vec![Cell::Int(2), Cell::Null]],
        );
        let result = JsonFileLoader::new(&path).load(&table);
        assert!(result.success);
        assert_eq!(result.row_count, 2);

        let back = JsonFileExtractor::new(&path).extract().unwrap();
        assert_eq!(back.column("name").unwrap(), vec![Cell::from("Ann"), Cell::Null]);
    }

    #[test]
    fn test_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileExtractor::new(dir.path().join("missing.json")).extract();
        assert!(matches!(missing, Err(SourceError::Io(_))));

        let path = dir.path().join("object.json");
        fs::write(&path, r#"{ "id": 1 }"#).unwrap();
        assert!(matches!(
            JsonFileExtractor::new(&path).extract(),
            Err(SourceError::NotRecords(_))
        ));

        let result = JsonFileLoader::new(dir.path().join("no/such/dir.json")).load(&Table::default());
        assert!(!result.success);
    }

    #[test]
    fn test_success_tracks_errors() {
        let result = LoadResult::ok(3).with_warning("slow").with_error("disk full");
        assert!(!result.success);
        assert_eq!(result.warnings, vec!["slow"]);

        let value = serde_json::to_value(LoadResult::ok(1)).unwrap();
        assert_eq!(value, json!({ "rowCount": 1, "success": true, "errors": [], "warnings": [] }));
    }
}
