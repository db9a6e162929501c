//! Wide/long reshaping: unpivot (melt), pivot and transpose.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::logs::log_warning;
use crate::models::{cell_at, duplicate_names, Cell, GroupKey, Row, Table};

// =============================================================================
// Unpivot
// =============================================================================

/// Output column names for [`unpivot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeltOptions {
    #[serde(default = "default_variable_column")]
    pub variable_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

fn default_variable_column() -> String {
    "variable".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

impl Default for MeltOptions {
    fn default() -> Self {
        Self {
            variable_column: default_variable_column(),
            value_column: default_value_column(),
        }
    }
}

/// Wide to long: one `[ids..., field name, field value]` row per input row
/// and value field. An empty `value_fields` means every non-id column in
/// header order.
pub fn unpivot<S: AsRef<str>, V: AsRef<str>>(
    table: &Table,
    id_fields: &[S],
    value_fields: &[V],
    options: &MeltOptions,
) -> EngineResult<Table> {
    let id_idx = table.field_indices(id_fields)?;
    let value_idx: Vec<usize> = if value_fields.is_empty() {
        (0..table.width()).filter(|i| !id_idx.contains(i)).collect()
    } else {
        table.field_indices(value_fields)?
    };

    let mut header: Vec<String> = id_idx.iter().map(|&i| table.header()[i].clone()).collect();
    header.push(options.variable_column.clone());
    header.push(options.value_column.clone());

    let mut rows: Vec<Row> = Vec::with_capacity(table.len() * value_idx.len());
    for row in table.rows() {
        for &v in &value_idx {
            let mut out: Row = id_idx.iter().map(|&i| cell_at(row, i).clone()).collect();
            out.push(Cell::Text(table.header()[v].clone()));
            out.push(cell_at(row, v).clone());
            rows.push(out);
        }
    }
    Ok(Table::new(header, rows))
}

/// Alias of [`unpivot`].
pub fn melt<S: AsRef<str>, V: AsRef<str>>(
    table: &Table,
    id_fields: &[S],
    value_fields: &[V],
    options: &MeltOptions,
) -> EngineResult<Table> {
    unpivot(table, id_fields, value_fields, options)
}

// =============================================================================
// Pivot
// =============================================================================

/// Two-argument combiner for pivot collisions: `(running, next) -> running`.
pub type CombineFn = Arc<dyn Fn(&Cell, &Cell) -> Cell + Send + Sync>;

/// How a second value for the same (group, column) cell is folded in.
#[derive(Clone)]
pub enum PivotAggregation {
    Sum,
    Min,
    Max,
    First,
    Last,
    Custom(CombineFn),
}

impl fmt::Debug for PivotAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotAggregation::Sum => write!(f, "Sum"),
            PivotAggregation::Min => write!(f, "Min"),
            PivotAggregation::Max => write!(f, "Max"),
            PivotAggregation::First => write!(f, "First"),
            PivotAggregation::Last => write!(f, "Last"),
            PivotAggregation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PivotAggregation {
    pub fn from_name(name: &str) -> EngineResult<Self> {
        match name.to_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(EngineError::invalid(format!("unknown pivot aggregation '{}'", other))),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Cell, &Cell) -> Cell + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Nulls never displace a value; non-numeric values leave a sum unchanged.
    pub fn combine(&self, running: &Cell, next: &Cell) -> Cell {
        match self {
            PivotAggregation::Custom(f) => f(running, next),
            _ if running.is_null() => next.clone(),
            _ if next.is_null() => running.clone(),
            PivotAggregation::Sum => running.checked_add(next).unwrap_or_else(|| running.clone()),
            PivotAggregation::Min => running.min(next).clone(),
            PivotAggregation::Max => running.max(next).clone(),
            PivotAggregation::First => running.clone(),
            PivotAggregation::Last => next.clone(),
        }
    }
}

/// Long to wide.
///
/// Rows are grouped by `index_fields` (first-seen order). Every distinct
/// `column_field` value across the table becomes a column, sorted
/// ascending, holding that group's `value_field`. Repeat values for one
/// cell are folded with `aggregation`; without one the first value wins.
/// Missing combinations are Null.
///
/// Column names are the display form of each value, so `Int(1)` and
/// `Text("1")` both name a column `"1"` and a Null value names one
/// `"null"`. Repeated names are kept and logged as a warning.
pub fn pivot<S: AsRef<str>>(
    table: &Table,
    index_fields: &[S],
    column_field: &str,
    value_field: &str,
    aggregation: Option<&PivotAggregation>,
) -> EngineResult<Table> {
    let index_idx = table.field_indices(index_fields)?;
    let column_idx = table.field_index(column_field)?;
    let value_idx = table.field_index(value_field)?;

    let mut columns: BTreeSet<Cell> = BTreeSet::new();
    let mut groups: IndexMap<GroupKey, HashMap<Cell, Cell>> = IndexMap::new();
    let mut collisions = 0usize;

    for row in table.rows() {
        let column = cell_at(row, column_idx).clone();
        let value = cell_at(row, value_idx);
        columns.insert(column.clone());

        let cells = groups.entry(GroupKey::from_row(row, &index_idx)).or_default();
        match cells.get_mut(&column) {
            None => {
                cells.insert(column, value.clone());
            }
            Some(running) => match aggregation {
                Some(agg) => *running = agg.combine(running, value),
                None => collisions += 1,
            },
        }
    }

    if collisions > 0 {
        log_warning(format!(
            "pivot: {} repeated value(s) without aggregation, kept first",
            collisions
        ));
    }

    let mut header: Vec<String> = index_idx.iter().map(|&i| table.header()[i].clone()).collect();
    header.extend(columns.iter().map(|c| c.to_string()));
    for name in duplicate_names(&header) {
        log_warning(format!("pivot output has duplicate column '{}'", name));
    }

    let rows = groups
        .into_iter()
        .map(|(key, mut cells)| {
            let mut row = key.into_values();
            row.extend(columns.iter().map(|c| cells.remove(c).unwrap_or_default()));
            row
        })
        .collect();
    Ok(Table::new(header, rows))
}

// =============================================================================
// Transpose
// =============================================================================

/// Swap rows and columns.
///
/// The header is stacked above the data as row 0, ragged rows are padded
/// to the widest with Null, and the matrix is transposed. The first row of
/// the result (the original first column) becomes the new header; the
/// remaining rows are the data.
pub fn transpose(table: &Table) -> Table {
    let width = table
        .rows()
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(table.width()))
        .max()
        .unwrap_or(0);
    if width == 0 {
        return Table::default();
    }

    let header_row: Row = table.header().iter().map(|h| Cell::Text(h.clone())).collect();
    let matrix: Vec<&[Cell]> = std::iter::once(header_row.as_slice())
        .chain(table.rows().iter().map(|r| r.as_slice()))
        .collect();

    let mut transposed: Vec<Row> = (0..width)
        .map(|col| matrix.iter().map(|row| cell_at(row, col).clone()).collect())
        .collect();

    let header = transposed
        .remove(0)
        .into_iter()
        .map(|c| match c {
            Cell::Text(s) => s,
            other => other.to_string(),
        })
        .collect();
    Table::new(header, transposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn long() -> Table {
        Table::from_rows(
            &["id", "type", "value"],
            vec![
                vec![Cell::Int(1), Cell::from("A"), Cell::Int(10)],
                vec![Cell::Int(1), Cell::from("A"), Cell::Int(20)],
                vec![Cell::Int(1), Cell::from("B"), Cell::Int(30)],
            ],
        )
    }

    #[test]
    fn test_pivot_sum_on_collision() {
        let out = pivot(&long(), &["id"], "type", "value", Some(&PivotAggregation::Sum)).unwrap();
        assert_eq!(out.header(), &["id", "A", "B"]);
        assert_eq!(out.rows(), &[vec![Cell::Int(1), Cell::Int(30), Cell::Int(30)]]);
    }

    #[test]
    fn test_pivot_keeps_first_without_aggregation() {
        let out = pivot(&long(), &["id"], "type", "value", None).unwrap();
        assert_eq!(out.rows(), &[vec![Cell::Int(1), Cell::Int(10), Cell::Int(30)]]);
    }

    #[test]
    fn test_pivot_sorted_columns_and_null_fill() {
        let table = Table::from_rows(
            &["id", "k", "v"],
            vec![
                vec![Cell::Int(2), Cell::from("z"), Cell::Int(1)],
                vec![Cell::Int(1), Cell::from("a"), Cell::Int(2)],
            ],
        );
        let out = pivot(&table, &["id"], "k", "v", None).unwrap();
        assert_eq!(out.header(), &["id", "a", "z"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Cell::Int(2), Cell::Null, Cell::Int(1)],
                vec![Cell::Int(1), Cell::Int(2), Cell::Null],
            ]
        );
    }

    #[test]
    fn test_pivot_custom_and_named_aggregation() {
        let concat = PivotAggregation::custom(|a, b| Cell::Text(format!("{}|{}", a, b)));
        let out = pivot(&long(), &["id"], "type", "value", Some(&concat)).unwrap();
        assert_eq!(out.rows()[0][1], Cell::from("10|20"));

        let max = PivotAggregation::from_name("MAX").unwrap();
        let out = pivot(&long(), &["id"], "type", "value", Some(&max)).unwrap();
        assert_eq!(out.rows()[0][1], Cell::Int(20));

        assert!(PivotAggregation::from_name("median").is_err());
        assert!(pivot(&long(), &["id"], "kind", "value", None).is_err());
    }

    #[test]
    fn test_pivot_keeps_colliding_display_names() {
        let table = Table::from_rows(
            &["id", "k", "v"],
            vec![
                vec![Cell::Int(1), Cell::from("1"), Cell::from("text")],
                vec![Cell::Int(1), Cell::Int(1), Cell::from("int")],
                vec![Cell::Int(1), Cell::Null, Cell::from("none")],
            ],
        );
        let out = pivot(&table, &["id"], "k", "v", None).unwrap();
        assert_eq!(out.header(), &["id", "null", "1", "1"]);
        assert_eq!(
            out.rows(),
            &[vec![Cell::Int(1), Cell::from("none"), Cell::from("int"), Cell::from("text")]]
        );
        assert_eq!(duplicate_names(out.header()), vec!["1"]);
    }

    #[test]
    fn test_unpivot_defaults() {
        let wide = Table::from_rows(
            &["id", "A", "B"],
            vec![vec![Cell::Int(1), Cell::Int(10), Cell::Int(30)]],
        );
        let none: &[&str] = &[];
        let out = unpivot(&wide, &["id"], none, &MeltOptions::default()).unwrap();
        assert_eq!(out.header(), &["id", "variable", "value"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Cell::Int(1), Cell::from("A"), Cell::Int(10)],
                vec![Cell::Int(1), Cell::from("B"), Cell::Int(30)],
            ]
        );
    }

    #[test]
    fn test_unpivot_row_count_and_names() {
        let wide = Table::from_rows(
            &["id", "A", "B", "C"],
            vec![
                vec![Cell::Int(1), Cell::Int(1), Cell::Int(2), Cell::Int(3)],
                vec![Cell::Int(2), Cell::Int(4), Cell::Int(5), Cell::Int(6)],
            ],
        );
        let options = MeltOptions {
            variable_column: "metric".into(),
            value_column: "reading".into(),
        };
        let out = melt(&wide, &["id"], &["C", "A"], &options).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out.header(), &["id", "metric", "reading"]);
        assert_eq!(out.rows()[0], vec![Cell::Int(1), Cell::from("C"), Cell::Int(3)]);
    }

    #[test]
    fn test_pivot_unpivot_round_trip() {
        let long = Table::from_rows(
            &["id", "variable", "value"],
            vec![
                vec![Cell::Int(1), Cell::from("b"), Cell::Int(2)],
                vec![Cell::Int(1), Cell::from("a"), Cell::Int(1)],
                vec![Cell::Int(2), Cell::from("a"), Cell::Int(3)],
                vec![Cell::Int(2), Cell::from("b"), Cell::Int(4)],
            ],
        );
        let wide = pivot(&long, &["id"], "variable", "value", None).unwrap();
        let none: &[&str] = &[];
        let back = unpivot(&wide, &["id"], none, &MeltOptions::default()).unwrap();

        let triples = |t: &Table| -> HashSet<Vec<Cell>> { t.rows().iter().cloned().collect() };
        assert_eq!(triples(&long), triples(&back));
    }

    #[test]
    fn test_transpose() {
        let table = Table::from_rows(
            &["name", "q1", "q2"],
            vec![
                vec![Cell::from("x"), Cell::Int(1), Cell::Int(2)],
                vec![Cell::from("y"), Cell::Int(3)],
            ],
        );
        let out = transpose(&table);
        assert_eq!(out.header(), &["name", "x", "y"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Cell::from("q1"), Cell::Int(1), Cell::Int(3)],
                vec![Cell::from("q2"), Cell::Int(2), Cell::Null],
            ]
        );
    }

    #[test]
    fn test_transpose_degenerate() {
        assert_eq!(transpose(&Table::default()), Table::default());
    }
}
