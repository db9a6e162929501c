//! Column-level transforms: projection, renaming, derived columns and
//! conditionals.
//!
//! Any operation that writes a column pads every row to the new header
//! width first, so short input rows never fail.

use indexmap::IndexMap;

use super::values::ValueOp;
use crate::error::{EngineError, EngineResult};
use crate::models::{cell_at, padded, Cell, Row, RowView, Table};

/// Keep only `fields`, in the given order.
pub fn select<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<Table> {
    let indices = table.field_indices(fields)?;
    let header = indices.iter().map(|&i| table.header()[i].clone()).collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&i| cell_at(row, i).clone()).collect())
        .collect();
    Ok(Table::new(header, rows))
}

/// Drop `fields`.
pub fn remove<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<Table> {
    let dropped = table.field_indices(fields)?;
    let kept: Vec<usize> = (0..table.width()).filter(|i| !dropped.contains(i)).collect();
    let header = kept.iter().map(|&i| table.header()[i].clone()).collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| kept.iter().map(|&i| cell_at(row, i).clone()).collect())
        .collect();
    Ok(Table::new(header, rows))
}

/// Rename columns, old name → new name.
pub fn rename(table: &Table, renames: &IndexMap<String, String>) -> EngineResult<Table> {
    let mut header = table.header().to_vec();
    for (old, new) in renames {
        let idx = table.field_index(old)?;
        header[idx] = new.clone();
    }
    Ok(Table::new(header, table.rows().to_vec()))
}

/// Write `values` into column `name`: replaced in place when it exists,
/// appended otherwise.
pub(crate) fn set_column(header: &[String], rows: &[Row], name: &str, values: Vec<Cell>) -> Table {
    let mut header = header.to_vec();
    let idx = match header.iter().position(|h| h == name) {
        Some(idx) => idx,
        None => {
            header.push(name.to_string());
            header.len() - 1
        }
    };

    let width = header.len();
    let rows = rows
        .iter()
        .zip(values)
        .map(|(row, value)| {
            let mut row = padded(row, width);
            row[idx] = value;
            row
        })
        .collect();
    Table::new(header, rows)
}

/// Derive column `name` from each row.
pub fn add_column<F>(table: &Table, name: &str, derive: F) -> Table
where
    F: Fn(&RowView<'_>) -> Cell,
{
    let values = table.rows().iter().map(|row| derive(&table.view(row))).collect();
    set_column(table.header(), table.rows(), name, values)
}

/// Rewrite every cell of `field` with `convert`.
pub fn convert<F>(table: &Table, field: &str, convert: F) -> EngineResult<Table>
where
    F: Fn(&Cell) -> Cell,
{
    let idx = table.field_index(field)?;
    let values = table.rows().iter().map(|row| convert(cell_at(row, idx))).collect();
    Ok(set_column(table.header(), table.rows(), field, values))
}

/// Replace cells of `field` equal to `from` with `to`.
pub fn replace(table: &Table, field: &str, from: &Cell, to: &Cell) -> EngineResult<Table> {
    convert(table, field, |cell| if cell == from { to.clone() } else { cell.clone() })
}

/// Run a chain of [`ValueOp`]s over `field`.
pub fn apply_ops(table: &Table, field: &str, ops: &[ValueOp]) -> EngineResult<Table> {
    let prepared = ops.iter().map(ValueOp::prepare).collect::<EngineResult<Vec<_>>>()?;
    convert(table, field, |cell| prepared.iter().fold(cell.clone(), |acc, op| op.apply(&acc)))
}

/// `target = predicate(row) ? then : otherwise`
pub fn when<F>(table: &Table, target: &str, predicate: F, then: Cell, otherwise: Cell) -> Table
where
    F: Fn(&RowView<'_>) -> bool,
{
    add_column(table, target, |row| {
        if predicate(row) {
            then.clone()
        } else {
            otherwise.clone()
        }
    })
}

/// `target` = first non-null of `fields`, else Null.
pub fn coalesce<S: AsRef<str>>(table: &Table, fields: &[S], target: &str) -> EngineResult<Table> {
    if fields.is_empty() {
        return Err(EngineError::invalid("coalesce requires at least one field"));
    }
    let indices = table.field_indices(fields)?;
    let values = table
        .rows()
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|&i| cell_at(row, i))
                .find(|c| !c.is_null())
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    Ok(set_column(table.header(), table.rows(), target, values))
}

/// A `case` branch: when the predicate holds, the value is used.
pub type CaseBranch<'a> = (Box<dyn Fn(&RowView<'_>) -> bool + 'a>, Cell);

/// `target` = value of the first branch whose predicate holds, else `default`.
pub fn case(table: &Table, target: &str, branches: &[CaseBranch<'_>], default: Cell) -> Table {
    add_column(table, target, |row| {
        branches
            .iter()
            .find(|(predicate, _)| predicate(row))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| default.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::from_rows(
            &["id", "amount", "note"],
            vec![
                vec![Cell::Int(1), Cell::Int(50), Cell::Null],
                vec![Cell::Int(2), Cell::Int(500)],
            ],
        )
    }

    #[test]
    fn test_select_and_remove() {
        let t = orders();
        let sel = select(&t, &["amount", "id"]).unwrap();
        assert_eq!(sel.header(), &["amount", "id"]);
        assert_eq!(sel.rows()[1], vec![Cell::Int(500), Cell::Int(2)]);

        let rem = remove(&t, &["amount"]).unwrap();
        assert_eq!(rem.header(), &["id", "note"]);
        assert_eq!(rem.rows()[1], vec![Cell::Int(2), Cell::Null]);

        assert!(select(&t, &["nope"]).is_err());
    }

    #[test]
    fn test_rename() {
        let mut renames = IndexMap::new();
        renames.insert("amount".to_string(), "total".to_string());
        let out = rename(&orders(), &renames).unwrap();
        assert_eq!(out.header(), &["id", "total", "note"]);

        renames.insert("ghost".to_string(), "x".to_string());
        assert!(matches!(rename(&orders(), &renames), Err(EngineError::FieldNotFound(_))));
    }

    #[test]
    fn test_add_column_pads_short_rows() {
        let out = add_column(&orders(), "big", |row| {
            Cell::Bool(row.value("amount").as_i64().is_some_and(|a| a > 100))
        });
        assert_eq!(out.header(), &["id", "amount", "note", "big"]);
        assert_eq!(out.rows()[1], vec![Cell::Int(2), Cell::Int(500), Cell::Null, Cell::Bool(true)]);
    }

    #[test]
    fn test_add_existing_column_replaces() {
        let out = add_column(&orders(), "note", |_| Cell::from("n/a"));
        assert_eq!(out.width(), 3);
        assert_eq!(out.column("note").unwrap(), vec![Cell::from("n/a"), Cell::from("n/a")]);
    }

    #[test]
    fn test_replace_and_apply_ops() {
        let out = replace(&orders(), "amount", &Cell::Int(50), &Cell::Int(55)).unwrap();
        assert_eq!(out.column("amount").unwrap(), vec![Cell::Int(55), Cell::Int(500)]);

        let ops = vec![ValueOp::ToText, ValueOp::PadStart { length: 4, char: "0".into() }];
        let out = apply_ops(&orders(), "amount", &ops).unwrap();
        assert_eq!(out.column("amount").unwrap(), vec![Cell::from("0050"), Cell::from("0500")]);

        let strip = vec![ValueOp::ToText, ValueOp::Replace { pattern: "0".into(), value: String::new() }];
        let out = apply_ops(&orders(), "amount", &strip).unwrap();
        assert_eq!(out.column("amount").unwrap(), vec![Cell::from("5"), Cell::from("5")]);

        let broken = vec![ValueOp::Replace { pattern: "[".into(), value: String::new() }];
        assert!(matches!(apply_ops(&orders(), "amount", &broken), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_conditionals() {
        let t = orders();
        let flagged = when(
            &t,
            "size",
            |row| row.value("amount").as_i64() > Some(100),
            Cell::from("large"),
            Cell::from("small"),
        );
        assert_eq!(flagged.column("size").unwrap(), vec![Cell::from("small"), Cell::from("large")]);

        let filled = coalesce(&t, &["note", "amount"], "note").unwrap();
        assert_eq!(filled.column("note").unwrap(), vec![Cell::Int(50), Cell::Int(500)]);

        let branches: Vec<CaseBranch<'_>> = vec![
            (Box::new(|row: &RowView<'_>| row.value("id") == &Cell::Int(1)), Cell::from("first")),
            (Box::new(|row: &RowView<'_>| row.value("amount").as_i64() == Some(500)), Cell::from("big")),
        ];
        let cased = case(&t, "label", &branches, Cell::Null);
        assert_eq!(cased.column("label").unwrap(), vec![Cell::from("first"), Cell::from("big")]);
    }
}
