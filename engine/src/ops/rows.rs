//! Row selection, filtering and sorting.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::EngineResult;
use crate::models::{cell_at, Cell, Row, RowView, Table};

// =============================================================================
// Selection
// =============================================================================

/// First `n` rows.
pub fn head(table: &Table, n: usize) -> Table {
    table.with_rows(table.rows().iter().take(n).cloned().collect())
}

/// Last `n` rows.
pub fn tail(table: &Table, n: usize) -> Table {
    let start = table.len().saturating_sub(n);
    table.with_rows(table.rows()[start..].to_vec())
}

/// Rows in `start..end`, clamped to the table.
pub fn slice(table: &Table, start: usize, end: usize) -> Table {
    let end = end.min(table.len());
    let start = start.min(end);
    table.with_rows(table.rows()[start..end].to_vec())
}

/// Everything after the first `n` rows.
pub fn skip(table: &Table, n: usize) -> Table {
    table.with_rows(table.rows().iter().skip(n).cloned().collect())
}

// =============================================================================
// Filtering
// =============================================================================

/// Keep rows for which `predicate` returns true.
pub fn filter<F>(table: &Table, predicate: F) -> Table
where
    F: Fn(&RowView<'_>) -> bool,
{
    let rows = table
        .rows()
        .iter()
        .filter(|row| predicate(&table.view(row)))
        .cloned()
        .collect();
    table.with_rows(rows)
}

/// Single-field test used by [`filter_where`] and the pipeline `filter` step.
///
/// Ordering tests (`gt`, `lt`, `gte`, `lte`) only hold between cells of the
/// same kind (number/number, text/text, bool/bool); Null never passes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Equals(Cell),
    NotEquals(Cell),
    Gt(Cell),
    Lt(Cell),
    Gte(Cell),
    Lte(Cell),
    In(Vec<Cell>),
    NotIn(Vec<Cell>),
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    /// Substring for text, element membership for lists
    Contains(String),
}

impl Condition {
    pub fn matches(&self, cell: &Cell) -> bool {
        match self {
            Condition::Equals(v) => cell == v,
            Condition::NotEquals(v) => cell != v,
            Condition::Gt(v) => comparable(cell, v).is_some_and(|o| o == Ordering::Greater),
            Condition::Lt(v) => comparable(cell, v).is_some_and(|o| o == Ordering::Less),
            Condition::Gte(v) => comparable(cell, v).is_some_and(|o| o != Ordering::Less),
            Condition::Lte(v) => comparable(cell, v).is_some_and(|o| o != Ordering::Greater),
            Condition::In(values) => values.contains(cell),
            Condition::NotIn(values) => !values.contains(cell),
            Condition::IsNull => cell.is_null(),
            Condition::IsNotNull => !cell.is_null(),
            Condition::IsTrue => cell.as_bool() == Some(true),
            Condition::IsFalse => cell.as_bool() == Some(false),
            Condition::Contains(needle) => match cell {
                Cell::Text(s) => s.contains(needle.as_str()),
                Cell::List(items) => items.iter().any(|c| c.as_str() == Some(needle.as_str())),
                _ => false,
            },
        }
    }
}

fn comparable(a: &Cell, b: &Cell) -> Option<Ordering> {
    let same_kind = matches!(
        (a, b),
        (Cell::Int(_) | Cell::Float(_), Cell::Int(_) | Cell::Float(_))
            | (Cell::Text(_), Cell::Text(_))
            | (Cell::Bool(_), Cell::Bool(_))
    );
    same_kind.then(|| a.cmp(b))
}

/// Keep rows whose `field` satisfies `condition`.
pub fn filter_where(table: &Table, field: &str, condition: &Condition) -> EngineResult<Table> {
    let idx = table.field_index(field)?;
    let rows = table
        .rows()
        .iter()
        .filter(|row| condition.matches(cell_at(row, idx)))
        .cloned()
        .collect();
    Ok(table.with_rows(rows))
}

// =============================================================================
// Sorting
// =============================================================================

/// Compare two cells for sorting. Null sorts last in both directions.
pub fn compare_nulls_last(a: &Cell, b: &Cell, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if descending => b.cmp(a),
        (false, false) => a.cmp(b),
    }
}

/// Lexicographic comparison over `indices`, later fields breaking ties.
pub fn compare_rows(a: &[Cell], b: &[Cell], indices: &[usize], descending: bool) -> Ordering {
    indices
        .iter()
        .map(|&i| compare_nulls_last(cell_at(a, i), cell_at(b, i), descending))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Stable sort by fields. Remaining ties keep their original relative order.
pub fn sort_by_fields<S: AsRef<str>>(table: &Table, fields: &[S], reverse: bool) -> EngineResult<Table> {
    let indices = table.key_indices(fields)?;
    let mut rows: Vec<Row> = table.rows().to_vec();
    rows.sort_by(|a, b| compare_rows(a, b, &indices, reverse));
    Ok(table.with_rows(rows))
}

/// Stable sort with a caller comparator; `reverse` flips it without breaking stability.
pub fn sort_with<F>(table: &Table, compare: F, reverse: bool) -> Table
where
    F: Fn(&RowView<'_>, &RowView<'_>) -> Ordering,
{
    let mut rows: Vec<Row> = table.rows().to_vec();
    rows.sort_by(|a, b| {
        let ord = compare(&table.view(a), &table.view(b));
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    });
    table.with_rows(rows)
}
