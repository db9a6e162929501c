//! Data model shared by every operation.
//!
//! - [`Cell`] - dynamically-typed scalar/nested value
//! - [`Table`] - header + rows, immutable once built
//! - [`RowView`] - name-keyed view handed to predicates
//! - [`GroupKey`] - structural key for grouping, dedup and partitioning

pub mod cell;
pub mod key;
pub mod table;

pub use cell::{Cell, NULL};
pub use key::{group_positions, GroupKey};
pub use table::{cell_at, duplicate_names, padded, Row, RowView, Table, ALL_FIELDS};
