//! Stacking tables: `concat`, `union`, `merge`.

use super::dedup::distinct;
use crate::error::{EngineError, EngineResult};
use crate::models::{cell_at, Row, Table, ALL_FIELDS};

/// Stack tables with identical headers, in order.
pub fn concat(tables: &[&Table]) -> EngineResult<Table> {
    let Some(first) = tables.first() else {
        return Ok(Table::default());
    };

    let mut rows: Vec<Row> = Vec::new();
    for table in tables {
        if table.header() != first.header() {
            return Err(EngineError::invalid(format!(
                "concat requires identical headers: {:?} vs {:?}",
                first.header(),
                table.header()
            )));
        }
        rows.extend(table.rows().iter().cloned());
    }
    Ok(Table::new(first.header().to_vec(), rows))
}

/// `concat` followed by whole-row `distinct`.
pub fn union(a: &Table, b: &Table) -> EngineResult<Table> {
    distinct(&concat(&[a, b])?, ALL_FIELDS)
}

/// Stack tables whose headers differ. The result header holds every column
/// name in first-seen order; cells are aligned by name, absent ones Null.
pub fn merge(tables: &[&Table]) -> Table {
    let mut header: Vec<String> = Vec::new();
    for table in tables {
        for name in table.header() {
            if !header.contains(name) {
                header.push(name.clone());
            }
        }
    }

    let mut rows: Vec<Row> = Vec::new();
    for table in tables {
        // Target position -> source position
        let mapping: Vec<Option<usize>> = header
            .iter()
            .map(|name| table.header().iter().position(|h| h == name))
            .collect();
        for row in table.rows() {
            rows.push(
                mapping
                    .iter()
                    .map(|src| src.map(|i| cell_at(row, i).clone()).unwrap_or_default())
                    .collect(),
            );
        }
    }
    Table::new(header, rows)
}
