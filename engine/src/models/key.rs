//! Structural grouping keys.
//!
//! A [`GroupKey`] is the tuple of cells selected from a row. Equal tuples
//! give equal keys whatever their origin, which is what grouping, dedup,
//! pivot and window partitioning all rely on.

use indexmap::IndexMap;

use super::cell::Cell;
use super::table::{cell_at, Row};

/// Equality/hash key over an ordered tuple of cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Vec<Cell>);

impl GroupKey {
    /// Key over `indices` of `row`; missing trailing cells read as `Null`.
    pub fn from_row(row: &[Cell], indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| cell_at(row, i).clone()).collect())
    }

    pub fn values(&self) -> &[Cell] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.0
    }
}

/// Row positions per key, keys in the order they first appear.
pub fn group_positions(rows: &[Row], indices: &[usize]) -> IndexMap<GroupKey, Vec<usize>> {
    let mut groups: IndexMap<GroupKey, Vec<usize>> = IndexMap::new();
    for (pos, row) in rows.iter().enumerate() {
        groups
            .entry(GroupKey::from_row(row, indices))
            .or_default()
            .push(pos);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_tuples_equal_keys() {
        let a = vec![Cell::Int(1), Cell::from("x"), Cell::Bool(true)];
        let b = vec![Cell::Float(1.0), Cell::from("x"), Cell::Bool(false)];
        assert_eq!(GroupKey::from_row(&a, &[0, 1]), GroupKey::from_row(&b, &[0, 1]));
        assert_ne!(GroupKey::from_row(&a, &[2]), GroupKey::from_row(&b, &[2]));
    }

    #[test]
    fn test_group_positions_first_seen_order() {
        let rows = vec![
            vec![Cell::from("IT")],
            vec![Cell::from("Sales")],
            vec![Cell::from("IT")],
        ];
        let groups = group_positions(&rows, &[0]);
        let keys: Vec<_> = groups.keys().map(|k| k.values()[0].clone()).collect();
        assert_eq!(keys, vec![Cell::from("IT"), Cell::from("Sales")]);
        assert_eq!(groups[0], vec![0, 2]);
    }
}
