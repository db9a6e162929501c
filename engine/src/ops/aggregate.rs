//! Group-by aggregation.
//!
//! Groups come out in the order their key first appears. Each output column
//! is produced by a [`Reducer`]:
//!
//! - a bare built-in ([`Reducer::Builtin`]) sees whole rows: `sum`, `avg`,
//!   `min` and `max` fold over every numeric cell of every column in the
//!   group, and `first`/`last` yield the whole first/last row as a list;
//! - a field-scoped built-in ([`Reducer::Field`]) folds one named column;
//! - a custom reducer receives the group's rows plus the header.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::models::{cell_at, group_positions, Cell, Row, Table};

/// Built-in reducer names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinReducer {
    Count,
    Sum,
    #[serde(alias = "mean")]
    Avg,
    Min,
    Max,
    First,
    Last,
}

impl BuiltinReducer {
    pub fn from_name(name: &str) -> EngineResult<Self> {
        match name.to_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" | "mean" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(EngineError::invalid(format!("unknown reducer '{}'", other))),
        }
    }
}

/// Custom reducer: group rows + header to one value.
pub type ReducerFn = Arc<dyn Fn(&[Row], &[String]) -> Cell + Send + Sync>;

/// How one output column of an aggregation is computed
#[derive(Clone)]
pub enum Reducer {
    Builtin(BuiltinReducer),
    Field { op: BuiltinReducer, field: String },
    Custom(ReducerFn),
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Builtin(op) => write!(f, "Builtin({:?})", op),
            Reducer::Field { op, field } => write!(f, "Field({:?}, {})", op, field),
            Reducer::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Reducer {
    /// Bare built-in by name (`count`, `sum`, `avg`/`mean`, `min`, `max`, `first`, `last`).
    pub fn named(name: &str) -> EngineResult<Self> {
        BuiltinReducer::from_name(name).map(Reducer::Builtin)
    }

    /// Built-in scoped to a single column.
    pub fn on(op: BuiltinReducer, field: impl Into<String>) -> Self {
        Reducer::Field { op, field: field.into() }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Row], &[String]) -> Cell + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }
}

/// Reducer with its field resolved against the input header.
enum Resolved<'a> {
    Rows(BuiltinReducer),
    Column(BuiltinReducer, usize),
    Custom(&'a ReducerFn),
}

impl Resolved<'_> {
    fn reduce(&self, rows: &[&Row], header: &[String]) -> Cell {
        match self {
            Resolved::Rows(op) => reduce_rows(*op, rows),
            Resolved::Column(op, idx) => {
                let cells: Vec<&Cell> = rows.iter().map(|r| cell_at(r, *idx)).collect();
                reduce_column(*op, &cells)
            }
            Resolved::Custom(f) => {
                let owned: Vec<Row> = rows.iter().map(|r| (*r).clone()).collect();
                f(&owned, header)
            }
        }
    }
}

fn reduce_rows(op: BuiltinReducer, rows: &[&Row]) -> Cell {
    match op {
        BuiltinReducer::Count => Cell::from(rows.len()),
        BuiltinReducer::First => rows.first().map(|r| Cell::List((*r).clone())).unwrap_or_default(),
        BuiltinReducer::Last => rows.last().map(|r| Cell::List((*r).clone())).unwrap_or_default(),
        _ => {
            let numbers: Vec<&Cell> = rows.iter().flat_map(|r| r.iter()).filter(|c| c.is_numeric()).collect();
            fold_numbers(op, &numbers)
        }
    }
}

fn reduce_column(op: BuiltinReducer, cells: &[&Cell]) -> Cell {
    match op {
        BuiltinReducer::Count => Cell::from(cells.iter().filter(|c| !c.is_null()).count()),
        BuiltinReducer::First => cells.first().map(|c| (*c).clone()).unwrap_or_default(),
        BuiltinReducer::Last => cells.last().map(|c| (*c).clone()).unwrap_or_default(),
        _ => {
            let numbers: Vec<&Cell> = cells.iter().copied().filter(|c| c.is_numeric()).collect();
            fold_numbers(op, &numbers)
        }
    }
}

/// Sum/avg/min/max over numeric cells. Sum of nothing is 0, the rest Null.
fn fold_numbers(op: BuiltinReducer, numbers: &[&Cell]) -> Cell {
    match op {
        BuiltinReducer::Sum => sum_cells(numbers),
        BuiltinReducer::Avg => {
            if numbers.is_empty() {
                return Cell::Null;
            }
            let total: f64 = numbers.iter().filter_map(|c| c.as_f64()).sum();
            Cell::Float(total / numbers.len() as f64)
        }
        BuiltinReducer::Min => numbers.iter().min().map(|c| (*c).clone()).unwrap_or_default(),
        BuiltinReducer::Max => numbers.iter().max().map(|c| (*c).clone()).unwrap_or_default(),
        BuiltinReducer::Count => Cell::from(numbers.len()),
        BuiltinReducer::First => numbers.first().map(|c| (*c).clone()).unwrap_or_default(),
        BuiltinReducer::Last => numbers.last().map(|c| (*c).clone()).unwrap_or_default(),
    }
}

fn sum_cells(numbers: &[&Cell]) -> Cell {
    numbers
        .iter()
        .fold(Cell::Int(0), |acc, c| acc.checked_add(c).unwrap_or(acc))
}

/// Group by `group_by` and compute one column per `(output, reducer)` pair.
///
/// With no group fields the whole table is one group and the result has
/// exactly one row, even for an empty input.
pub fn aggregate<S, O>(table: &Table, group_by: &[S], reducers: &[(O, Reducer)]) -> EngineResult<Table>
where
    S: AsRef<str>,
    O: AsRef<str>,
{
    if reducers.is_empty() {
        return Err(EngineError::invalid("aggregate requires at least one reducer"));
    }

    let key_idx = table.field_indices(group_by)?;
    let resolved: Vec<Resolved<'_>> = reducers
        .iter()
        .map(|(_, reducer)| match reducer {
            Reducer::Builtin(op) => Ok(Resolved::Rows(*op)),
            Reducer::Field { op, field } => Ok(Resolved::Column(*op, table.field_index(field)?)),
            Reducer::Custom(f) => Ok(Resolved::Custom(f)),
        })
        .collect::<EngineResult<_>>()?;

    let mut header: Vec<String> = key_idx.iter().map(|&i| table.header()[i].clone()).collect();
    header.extend(reducers.iter().map(|(name, _)| name.as_ref().to_string()));

    let groups = group_positions(table.rows(), &key_idx);
    let mut rows: Vec<Row> = Vec::with_capacity(groups.len().max(1));

    if key_idx.is_empty() && groups.is_empty() {
        rows.push(resolved.iter().map(|r| r.reduce(&[], table.header())).collect());
        return Ok(Table::new(header, rows));
    }

    for (key, positions) in groups {
        let members: Vec<&Row> = positions.iter().map(|&p| &table.rows()[p]).collect();
        let mut row = key.into_values();
        row.extend(resolved.iter().map(|r| r.reduce(&members, table.header())));
        rows.push(row);
    }
    Ok(Table::new(header, rows))
}

/// Row count per group, in a `count` column.
pub fn count<S: AsRef<str>>(table: &Table, group_by: &[S]) -> EngineResult<Table> {
    aggregate(table, group_by, &[("count", Reducer::Builtin(BuiltinReducer::Count))])
}

/// Sum of one field per group, in a column named after the field.
pub fn sum<S: AsRef<str>>(table: &Table, field: &str, group_by: &[S]) -> EngineResult<Table> {
    aggregate(table, group_by, &[(field, Reducer::on(BuiltinReducer::Sum, field))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ALL_FIELDS;

    fn sales() -> Table {
        Table::from_rows(
            &["dept", "amt"],
            vec![
                vec![Cell::from("Sales"), Cell::Int(100)],
                vec![Cell::from("Sales"), Cell::Int(150)],
                vec![Cell::from("IT"), Cell::Int(200)],
            ],
        )
    }

    #[test]
    fn test_custom_sum_reducer_first_seen_order() {
        let sum_amt = Reducer::custom(|rows, header| {
            let idx = header.iter().position(|h| h == "amt").unwrap_or(0);
            rows.iter()
                .fold(Cell::Int(0), |acc, r| acc.checked_add(cell_at(r, idx)).unwrap_or(acc))
        });
        let out = aggregate(&sales(), &["dept"], &[("amt", sum_amt)]).unwrap();
        assert_eq!(out.header(), &["dept", "amt"]);
        assert_eq!(
            out.rows(),
            &[vec![Cell::from("Sales"), Cell::Int(250)], vec![Cell::from("IT"), Cell::Int(200)]]
        );
    }

    #[test]
    fn test_bare_builtins_span_every_numeric_column() {
        let table = Table::from_rows(
            &["dept", "a", "b"],
            vec![
                vec![Cell::from("x"), Cell::Int(1), Cell::Int(10)],
                vec![Cell::from("x"), Cell::Float(2.5), Cell::Null],
            ],
        );
        let out = aggregate(
            &table,
            &["dept"],
            &[
                ("sum", Reducer::named("sum").unwrap()),
                ("max", Reducer::named("max").unwrap()),
                ("n", Reducer::named("count").unwrap()),
                ("first", Reducer::named("first").unwrap()),
            ],
        )
        .unwrap();
        let row = &out.rows()[0];
        assert_eq!(row[1], Cell::Float(13.5));
        assert_eq!(row[2], Cell::Int(10));
        assert_eq!(row[3], Cell::Int(2));
        assert_eq!(row[4], Cell::List(vec![Cell::from("x"), Cell::Int(1), Cell::Int(10)]));
    }

    #[test]
    fn test_field_scoped_reducers() {
        let out = aggregate(
            &sales(),
            &["dept"],
            &[
                ("avg", Reducer::on(BuiltinReducer::Avg, "amt")),
                ("min", Reducer::on(BuiltinReducer::Min, "amt")),
                ("last", Reducer::on(BuiltinReducer::Last, "amt")),
            ],
        )
        .unwrap();
        assert_eq!(out.rows()[0][1..], [Cell::Float(125.0), Cell::Int(100), Cell::Int(150)]);
    }

    #[test]
    fn test_count_and_sum_wrappers() {
        let counted = count(&sales(), &["dept"]).unwrap();
        assert_eq!(counted.column("count").unwrap(), vec![Cell::Int(2), Cell::Int(1)]);

        let total = sum(&sales(), "amt", ALL_FIELDS).unwrap();
        assert_eq!(total.header(), &["amt"]);
        assert_eq!(total.rows(), &[vec![Cell::Int(450)]]);

        let empty = Table::from_rows::<&str, Cell>(&["dept", "amt"], vec![]);
        assert_eq!(count(&empty, ALL_FIELDS).unwrap().rows(), &[vec![Cell::Int(0)]]);
        assert!(count(&empty, &["dept"]).unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        let none: &[(&str, Reducer)] = &[];
        assert!(matches!(aggregate(&sales(), &["dept"], none), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(Reducer::named("median"), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(count(&sales(), &["region"]), Err(EngineError::FieldNotFound(_))));
        assert!(matches!(
            sum(&sales(), "price", &["dept"]),
            Err(EngineError::FieldNotFound(name)) if name == "price"
        ));
    }

    #[test]
    fn test_builtin_names_deserialize() {
        let op: BuiltinReducer = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(op, BuiltinReducer::Avg);
    }
}
