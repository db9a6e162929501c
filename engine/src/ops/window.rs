//! Analytic window functions.
//!
//! Every function materializes the whole input, splits it into partitions
//! by [`GroupKey`] over `partition_by` (first-seen order), optionally
//! stable-sorts each partition by `order_by` (Null last), computes one value
//! per row and writes it to the target column. Unless noted, output rows
//! are the partitions concatenated in first-seen order, each in its
//! (possibly sorted) window order; with neither partitioning nor ordering
//! that is the original row order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::columns::set_column;
use super::rows::compare_rows;
use crate::error::{EngineError, EngineResult};
use crate::models::{cell_at, group_positions, Cell, GroupKey, Row, Table};

/// Partitioning and ordering of a window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default)]
    pub descending: bool,
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn partition_by(mut self, field: impl Into<String>) -> Self {
        self.partition_by.push(field.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    #[must_use]
    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }
}

/// Offset and fill value for [`lag`] / [`lead`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagLeadOptions {
    #[serde(default = "default_offset")]
    pub offset: usize,
    #[serde(default)]
    pub default: Cell,
}

fn default_offset() -> usize {
    1
}

impl Default for LagLeadOptions {
    fn default() -> Self {
        Self {
            offset: default_offset(),
            default: Cell::Null,
        }
    }
}

/// Row positions per partition, each sorted by the window order.
fn partitions(table: &Table, window: &WindowSpec) -> EngineResult<Vec<Vec<usize>>> {
    let part_idx = table.field_indices(&window.partition_by)?;
    let order_idx = table.field_indices(&window.order_by)?;

    let mut parts: Vec<Vec<usize>> = if part_idx.is_empty() {
        vec![(0..table.len()).collect()]
    } else {
        group_positions(table.rows(), &part_idx).into_values().collect()
    };

    if !order_idx.is_empty() {
        let rows = table.rows();
        for part in &mut parts {
            part.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], &order_idx, window.descending));
        }
    }
    Ok(parts)
}

/// Rows in `order`, with `values` written to `target`.
fn emit(table: &Table, order: &[usize], values: Vec<Cell>, target: &str) -> Table {
    let rows: Vec<Row> = order.iter().map(|&i| table.rows()[i].clone()).collect();
    set_column(table.header(), &rows, target, values)
}

fn shifted(table: &Table, field: &str, target: &str, options: &LagLeadOptions, window: &WindowSpec, back: bool) -> EngineResult<Table> {
    let idx = table.field_index(field)?;
    let parts = partitions(table, window)?;

    let mut order = Vec::with_capacity(table.len());
    let mut values = Vec::with_capacity(table.len());
    for part in &parts {
        for (pos, &row) in part.iter().enumerate() {
            let source = if back {
                pos.checked_sub(options.offset)
            } else {
                pos.checked_add(options.offset).filter(|&p| p < part.len())
            };
            values.push(match source {
                Some(p) => cell_at(&table.rows()[part[p]], idx).clone(),
                None => options.default.clone(),
            });
            order.push(row);
        }
    }
    Ok(emit(table, &order, values, target))
}

/// Value of `field` from `offset` rows earlier in the partition.
pub fn lag(table: &Table, field: &str, target: &str, options: &LagLeadOptions, window: &WindowSpec) -> EngineResult<Table> {
    shifted(table, field, target, options, window, true)
}

/// Value of `field` from `offset` rows later in the partition.
pub fn lead(table: &Table, field: &str, target: &str, options: &LagLeadOptions, window: &WindowSpec) -> EngineResult<Table> {
    shifted(table, field, target, options, window, false)
}

/// 1-based position within each partition.
///
/// With `order_by` the whole table is stable-sorted first and the output
/// follows that order; without it numbering and output follow the
/// original order. Partitions are not regrouped.
pub fn row_number(table: &Table, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    let part_idx = table.field_indices(&window.partition_by)?;
    let order_idx = table.field_indices(&window.order_by)?;

    let rows = table.rows();
    let mut order: Vec<usize> = (0..table.len()).collect();
    if !order_idx.is_empty() {
        order.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], &order_idx, window.descending));
    }

    let mut counters: HashMap<GroupKey, i64> = HashMap::new();
    let values = order
        .iter()
        .map(|&i| {
            let n = counters.entry(GroupKey::from_row(&rows[i], &part_idx)).or_insert(0);
            *n += 1;
            Cell::Int(*n)
        })
        .collect();
    Ok(emit(table, &order, values, target))
}

/// Rank positions for one sorted partition: (rank, dense rank) per row.
fn rank_positions(rows: &[Row], part: &[usize], order_idx: &[usize]) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(part.len());
    let mut rank = 0;
    let mut dense = 0;
    for (pos, &row) in part.iter().enumerate() {
        let tied = pos > 0 && compare_rows(&rows[part[pos - 1]], &rows[row], order_idx, false) == Ordering::Equal;
        if !tied {
            rank = pos + 1;
            dense += 1;
        }
        out.push((rank, dense));
    }
    out
}

fn ranked<F>(table: &Table, target: &str, window: &WindowSpec, value: F) -> EngineResult<Table>
where
    F: Fn(usize, usize, usize) -> Cell,
{
    if window.order_by.is_empty() {
        return Err(EngineError::invalid("rank functions require order_by"));
    }
    let order_idx = table.field_indices(&window.order_by)?;
    let parts = partitions(table, window)?;

    let mut order = Vec::with_capacity(table.len());
    let mut values = Vec::with_capacity(table.len());
    for part in &parts {
        for (&row, (rank, dense)) in part.iter().zip(rank_positions(table.rows(), part, &order_idx)) {
            order.push(row);
            values.push(value(rank, dense, part.len()));
        }
    }
    Ok(emit(table, &order, values, target))
}

/// Standard RANK: ties share the lowest rank, gaps follow.
pub fn rank(table: &Table, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    ranked(table, target, window, |rank, _, _| Cell::from(rank))
}

/// DENSE_RANK: ties share a rank, the next value gets the next integer.
pub fn dense_rank(table: &Table, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    ranked(table, target, window, |_, dense, _| Cell::from(dense))
}

/// `(rank - 1) / (partition size - 1)`, 0.0 for single-row partitions.
pub fn percent_rank(table: &Table, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    ranked(table, target, window, |rank, _, size| {
        if size <= 1 {
            Cell::Float(0.0)
        } else {
            Cell::Float((rank - 1) as f64 / (size - 1) as f64)
        }
    })
}

/// Split each partition into `buckets` near-equal groups numbered from 1;
/// earlier buckets take the remainder rows.
pub fn ntile(table: &Table, buckets: usize, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    if buckets == 0 {
        return Err(EngineError::invalid("ntile requires at least one bucket"));
    }
    let parts = partitions(table, window)?;

    let mut order = Vec::with_capacity(table.len());
    let mut values = Vec::with_capacity(table.len());
    for part in &parts {
        let base = part.len() / buckets;
        let extra = part.len() % buckets;
        // Rows held by the first `extra` buckets
        let big = extra * (base + 1);
        for (pos, &row) in part.iter().enumerate() {
            let bucket = if pos < big {
                pos / (base + 1)
            } else {
                extra + (pos - big) / base.max(1)
            };
            order.push(row);
            values.push(Cell::from(bucket + 1));
        }
    }
    Ok(emit(table, &order, values, target))
}

/// Cumulative sum of numeric `field` values within each partition.
/// Non-numeric cells contribute nothing.
pub fn running_sum(table: &Table, field: &str, target: &str, window: &WindowSpec) -> EngineResult<Table> {
    let idx = table.field_index(field)?;
    let parts = partitions(table, window)?;

    let mut order = Vec::with_capacity(table.len());
    let mut values = Vec::with_capacity(table.len());
    for part in &parts {
        let mut total = Cell::Int(0);
        for &row in part {
            if let Some(next) = total.checked_add(cell_at(&table.rows()[row], idx)) {
                total = next;
            }
            order.push(row);
            values.push(total.clone());
        }
    }
    Ok(emit(table, &order, values, target))
}
