//! Deduplication over [`GroupKey`]s. An empty field list keys on the whole row.

use crate::error::EngineResult;
use crate::models::{group_positions, Cell, Table};

/// First row per key, in first-seen order.
pub fn distinct<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<Table> {
    let indices = table.key_indices(fields)?;
    let rows = group_positions(table.rows(), &indices)
        .into_values()
        .map(|positions| table.rows()[positions[0]].clone())
        .collect();
    Ok(table.with_rows(rows))
}

/// Alias of [`distinct`].
pub fn unique<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<Table> {
    distinct(table, fields)
}

/// One row (the first occurrence) per key seen at least twice, in first-seen order.
pub fn duplicates<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<Table> {
    let indices = table.key_indices(fields)?;
    let rows = group_positions(table.rows(), &indices)
        .into_values()
        .filter(|positions| positions.len() >= 2)
        .map(|positions| table.rows()[positions[0]].clone())
        .collect();
    Ok(table.with_rows(rows))
}

/// One row per distinct key (the key columns) plus an occurrence count column.
pub fn count_distinct<S: AsRef<str>>(table: &Table, fields: &[S], count_field: &str) -> EngineResult<Table> {
    let indices = table.key_indices(fields)?;
    let mut header: Vec<String> = indices.iter().map(|&i| table.header()[i].clone()).collect();
    header.push(count_field.to_string());

    let rows = group_positions(table.rows(), &indices)
        .into_iter()
        .map(|(key, positions)| {
            let mut row = key.into_values();
            row.push(Cell::from(positions.len()));
            row
        })
        .collect();
    Ok(Table::new(header, rows))
}

/// True iff no key repeats.
pub fn is_unique<S: AsRef<str>>(table: &Table, fields: &[S]) -> EngineResult<bool> {
    let indices = table.key_indices(fields)?;
    Ok(group_positions(table.rows(), &indices).len() == table.len())
}
