//! The table shape contract: an ordered header plus rows of cells.
//!
//! Rows may be shorter than the header when a producer hands them over
//! that way. Reads past the end of a row yield `Null`; operations that add
//! a column pad every row to the new width when they write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cell::{Cell, NULL};
use crate::error::{EngineError, EngineResult};

/// A row of cells, positionally aligned with a header.
pub type Row = Vec<Cell>;

/// Pass as a field list to key on every column of the header.
pub const ALL_FIELDS: &[&str] = &[];

/// An immutable header + rows pair. Every operation returns a new `Table`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Build a table from string-ish column names and cell-convertible rows.
    pub fn from_rows<S, C>(header: &[S], rows: Vec<Vec<C>>) -> Self
    where
        S: AsRef<str>,
        C: Into<Cell>,
    {
        Self {
            header: header.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Build a table from JSON objects; the header is every key in first-seen order.
    pub fn from_records(records: &[Value]) -> EngineResult<Self> {
        let mut header: Vec<String> = Vec::new();
        for record in records {
            let obj = record
                .as_object()
                .ok_or_else(|| EngineError::invalid("record is not a JSON object"))?;
            for key in obj.keys() {
                if !header.iter().any(|h| h == key) {
                    header.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(|r| r.as_object())
            .map(|obj| {
                header
                    .iter()
                    .map(|h| obj.get(h).cloned().map(Cell::from).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { header, rows })
    }

    /// One JSON object per row, keyed by header name in header order.
    ///
    /// A repeated column name (e.g. after a join) is keyed `name_2`,
    /// `name_3`, ... so no column overwrites another.
    pub fn to_records(&self) -> Vec<Value> {
        let keys = record_keys(&self.header);
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = keys
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.clone(), Value::from(cell_at(row, i).clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.header, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Positional index of a column; absent names are fatal.
    pub fn field_index(&self, name: &str) -> EngineResult<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EngineError::field_not_found(name))
    }

    /// Resolve several names up front. An empty list resolves to every column.
    pub fn key_indices<S: AsRef<str>>(&self, fields: &[S]) -> EngineResult<Vec<usize>> {
        if fields.is_empty() {
            return Ok((0..self.header.len()).collect());
        }
        fields.iter().map(|f| self.field_index(f.as_ref())).collect()
    }

    /// Resolve several names; an empty list stays empty.
    pub fn field_indices<S: AsRef<str>>(&self, fields: &[S]) -> EngineResult<Vec<usize>> {
        fields.iter().map(|f| self.field_index(f.as_ref())).collect()
    }

    pub fn column(&self, name: &str) -> EngineResult<Vec<Cell>> {
        let idx = self.field_index(name)?;
        Ok(self.rows.iter().map(|r| cell_at(r, idx).clone()).collect())
    }

    pub fn view<'a>(&'a self, row: &'a [Cell]) -> RowView<'a> {
        RowView::new(&self.header, row)
    }

    /// Same header, new rows.
    pub(crate) fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            header: self.header.clone(),
            rows,
        }
    }
}

fn record_keys(header: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(header.len());
    for name in header {
        let mut key = name.clone();
        let mut n = 2;
        while keys.contains(&key) {
            key = format!("{}_{}", name, n);
            n += 1;
        }
        keys.push(key);
    }
    keys
}

/// Names that occur more than once in `header`, each listed once.
pub fn duplicate_names(header: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for (i, name) in header.iter().enumerate() {
        if header[..i].contains(name) && !out.contains(&name.as_str()) {
            out.push(name);
        }
    }
    out
}

/// Cell at `idx`, or `Null` for a short row.
pub fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&NULL)
}

/// Copy of `row` padded with `Null` (or truncated) to exactly `width` cells.
pub fn padded(row: &[Cell], width: usize) -> Row {
    let mut out: Row = row.iter().take(width).cloned().collect();
    out.resize(width, Cell::Null);
    out
}

/// Name-keyed read-only view of a row, as handed to predicates.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    header: &'a [String],
    row: &'a [Cell],
}

impl<'a> RowView<'a> {
    pub fn new(header: &'a [String], row: &'a [Cell]) -> Self {
        Self { header, row }
    }

    /// `None` when the header has no such column.
    pub fn get(&self, name: &str) -> Option<&'a Cell> {
        let idx = self.header.iter().position(|h| h == name)?;
        Some(cell_at(self.row, idx))
    }

    /// Like [`RowView::get`] but absent columns read as `Null`.
    pub fn value(&self, name: &str) -> &'a Cell {
        self.get(name).unwrap_or(&NULL)
    }

    pub fn header(&self) -> &'a [String] {
        self.header
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.row
    }
}
