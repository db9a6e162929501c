//! Hash joins, single or multi-key.
//!
//! The build side is hashed by its key tuple (every matching row is kept),
//! then the stream side is scanned in order. Output rows are the stream row
//! followed by the build row minus its key columns, so:
//!
//! ```text
//! inner/left: [left columns..., right non-key columns...]
//! right:      [right columns..., left non-key columns...]
//! ```
//!
//! Non-key columns that share a name across both tables are kept as-is,
//! without renaming; a warning is logged when that happens. Records built
//! from such a table key the repeats `name_2`, `name_3`, ... (see
//! [`Table::to_records`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::logs::log_warning;
use crate::models::{cell_at, duplicate_names, padded, GroupKey, Row, Table};

/// Join variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

/// Join on same-named keys in both tables.
pub fn join<S: AsRef<str>>(left: &Table, right: &Table, kind: JoinKind, keys: &[S]) -> EngineResult<Table> {
    join_on(left, right, kind, keys, keys)
}

/// Join with distinct key names per side, matched positionally.
pub fn join_on<S: AsRef<str>, T: AsRef<str>>(
    left: &Table,
    right: &Table,
    kind: JoinKind,
    left_keys: &[S],
    right_keys: &[T],
) -> EngineResult<Table> {
    if left_keys.is_empty() {
        return Err(EngineError::invalid("join requires at least one key"));
    }
    if left_keys.len() != right_keys.len() {
        return Err(EngineError::invalid(format!(
            "join key count mismatch: {} left vs {} right",
            left_keys.len(),
            right_keys.len()
        )));
    }

    let left_idx = left.field_indices(left_keys)?;
    let right_idx = right.field_indices(right_keys)?;

    let out = match kind {
        JoinKind::Inner => hash_join(left, &left_idx, right, &right_idx, false),
        JoinKind::Left => hash_join(left, &left_idx, right, &right_idx, true),
        JoinKind::Right => hash_join(right, &right_idx, left, &left_idx, true),
    };

    warn_on_duplicate_columns(out.header());
    Ok(out)
}

pub fn inner_join<S: AsRef<str>>(left: &Table, right: &Table, keys: &[S]) -> EngineResult<Table> {
    join(left, right, JoinKind::Inner, keys)
}

pub fn left_join<S: AsRef<str>>(left: &Table, right: &Table, keys: &[S]) -> EngineResult<Table> {
    join(left, right, JoinKind::Left, keys)
}

pub fn right_join<S: AsRef<str>>(left: &Table, right: &Table, keys: &[S]) -> EngineResult<Table> {
    join(left, right, JoinKind::Right, keys)
}

fn hash_join(stream: &Table, stream_keys: &[usize], build: &Table, build_keys: &[usize], keep_unmatched: bool) -> Table {
    let carried: Vec<usize> = (0..build.width()).filter(|i| !build_keys.contains(i)).collect();

    let mut header = stream.header().to_vec();
    header.extend(carried.iter().map(|&i| build.header()[i].clone()));

    let mut index: HashMap<GroupKey, Vec<usize>> = HashMap::new();
    for (pos, row) in build.rows().iter().enumerate() {
        index.entry(GroupKey::from_row(row, build_keys)).or_default().push(pos);
    }

    let mut rows: Vec<Row> = Vec::new();
    for row in stream.rows() {
        let base = padded(row, stream.width());
        match index.get(&GroupKey::from_row(row, stream_keys)) {
            Some(matches) => {
                for &pos in matches {
                    let other = &build.rows()[pos];
                    let mut out = base.clone();
                    out.extend(carried.iter().map(|&i| cell_at(other, i).clone()));
                    rows.push(out);
                }
            }
            None if keep_unmatched => {
                let mut out = base;
                out.resize(header.len(), Default::default());
                rows.push(out);
            }
            None => {}
        }
    }

    Table::new(header, rows)
}

fn warn_on_duplicate_columns(header: &[String]) {
    for name in duplicate_names(header) {
        log_warning(format!("join output has duplicate column '{}'", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn people() -> Table {
        Table::from_rows(
            &["id", "name"],
            vec![
                vec![Cell::Int(1), Cell::from("Alice")],
                vec![Cell::Int(2), Cell::from("Bob")],
            ],
        )
    }

    fn ages() -> Table {
        Table::from_rows(
            &["id", "age"],
            vec![vec![Cell::Int(1), Cell::Int(25)], vec![Cell::Int(3), Cell::Int(40)]],
        )
    }

    #[test]
    fn test_inner_join() {
        let out = inner_join(&people(), &ages(), &["id"]).unwrap();
        assert_eq!(out.header(), &["id", "name", "age"]);
        assert_eq!(out.rows(), &[vec![Cell::Int(1), Cell::from("Alice"), Cell::Int(25)]]);
    }

    #[test]
    fn test_left_join_fills_nulls() {
        let out = left_join(&people(), &ages(), &["id"]).unwrap();
        assert_eq!(
            out.rows(),
            &[
                vec![Cell::Int(1), Cell::from("Alice"), Cell::Int(25)],
                vec![Cell::Int(2), Cell::from("Bob"), Cell::Null],
            ]
        );
    }

    #[test]
    fn test_right_join_puts_right_columns_first() {
        let out = right_join(&people(), &ages(), &["id"]).unwrap();
        assert_eq!(out.header(), &["id", "age", "name"]);
        assert_eq!(
            out.rows(),
            &[
                vec![Cell::Int(1), Cell::Int(25), Cell::from("Alice")],
                vec![Cell::Int(3), Cell::Int(40), Cell::Null],
            ]
        );
    }

    #[test]
    fn test_every_match_is_emitted() {
        let right = Table::from_rows(
            &["id", "age"],
            vec![vec![Cell::Int(1), Cell::Int(25)], vec![Cell::Int(1), Cell::Int(26)]],
        );
        let out = inner_join(&people(), &right, &["id"]).unwrap();
        assert_eq!(out.column("age").unwrap(), vec![Cell::Int(25), Cell::Int(26)]);
    }

    #[test]
    fn test_multi_key_with_different_names() {
        let left = Table::from_rows(
            &["y", "m", "sales"],
            vec![
                vec![Cell::Int(2024), Cell::Int(1), Cell::Int(10)],
                vec![Cell::Int(2024), Cell::Int(2), Cell::Int(20)],
            ],
        );
        let right = Table::from_rows(
            &["year", "month", "target"],
            vec![vec![Cell::Int(2024), Cell::Int(2), Cell::Int(15)]],
        );
        let out = join_on(&left, &right, JoinKind::Inner, &["y", "m"], &["year", "month"]).unwrap();
        assert_eq!(out.header(), &["y", "m", "sales", "target"]);
        assert_eq!(out.rows(), &[vec![Cell::Int(2024), Cell::Int(2), Cell::Int(20), Cell::Int(15)]]);
    }

    #[test]
    fn test_shared_column_names_are_not_renamed() {
        let right = Table::from_rows(&["id", "name"], vec![vec![Cell::Int(1), Cell::from("A.")]]);
        let out = inner_join(&people(), &right, &["id"]).unwrap();
        assert_eq!(out.header(), &["id", "name", "name"]);
    }

    #[test]
    fn test_cardinality_properties() {
        let inner = inner_join(&people(), &ages(), &["id"]).unwrap();
        let left = left_join(&people(), &ages(), &["id"]).unwrap();
        assert!(inner.len() <= left.len());
        assert!(left.len() >= people().len());
    }

    #[test]
    fn test_missing_key_is_fatal() {
        assert!(matches!(
            inner_join(&people(), &ages(), &["name"]),
            Err(EngineError::FieldNotFound(name)) if name == "name"
        ));
        assert!(matches!(
            join_on(&people(), &ages(), JoinKind::Left, &["id"], &["id", "age"]),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
