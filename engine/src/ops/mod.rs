//! Table operations. Every function takes `&Table` and returns a new table;
//! inputs are never mutated.

pub mod aggregate;
pub mod columns;
pub mod dedup;
pub mod join;
pub mod reshape;
pub mod rows;
pub mod set_ops;
pub mod values;
pub mod window;

pub use aggregate::{aggregate, count, sum, BuiltinReducer, Reducer, ReducerFn};
pub use columns::{add_column, apply_ops, case, coalesce, convert, remove, rename, replace, select, when, CaseBranch};
pub use dedup::{count_distinct, distinct, duplicates, is_unique, unique};
pub use join::{inner_join, join, join_on, left_join, right_join, JoinKind};
pub use reshape::{melt, pivot, transpose, unpivot, CombineFn, MeltOptions, PivotAggregation};
pub use rows::{
    compare_nulls_last, compare_rows, filter, filter_where, head, skip, slice, sort_by_fields, sort_with, tail,
    Condition,
};
pub use set_ops::{concat, merge, union};
pub use values::{PreparedOp, ValueOp};
pub use window::{
    dense_rank, lag, lead, ntile, percent_rank, rank, row_number, running_sum, LagLeadOptions, WindowSpec,
};
