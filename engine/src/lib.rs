//! # Rowframe - in-memory relational transforms over dynamically-typed rows
//!
//! A table is a header (ordered column names) plus rows of [`Cell`]s. Every
//! operation takes a table and returns a new one: filtering, sorting,
//! dedup, hash joins, group-by aggregation, pivot/unpivot/transpose,
//! partitioned window functions and rule-based validation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Extract   │────▶│    Table    │────▶│  ops / plan │────▶│    Load     │
//! │  (records)  │     │ header+rows │     │  (pipeline) │     │ LoadResult  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowframe::{left_join, Cell, Table};
//!
//! let people = Table::from_rows(&["id", "name"], vec![vec![Cell::Int(1), Cell::from("Alice")]]);
//! let ages = Table::from_rows(&["id", "age"], vec![vec![Cell::Int(1), Cell::Int(25)]]);
//! let joined = left_join(&people, &ages, &["id"])?;
//! assert_eq!(joined.header(), &["id", "name", "age"]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`logs`] - Engine event broadcasting
//! - [`models`] - Cell, Table and grouping keys
//! - [`ops`] - Table operations
//! - [`validation`] - Per-field rules and reports
//! - [`io`] - Extract/Load collaborator contracts
//! - [`pipeline`] - Declarative JSON step plans

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Operations
pub mod ops;

// Validation
pub mod validation;

// Collaborators
pub mod io;

// Plans
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{EngineError, EngineResult, PipelineError, PipelineResult, SourceError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, GroupKey, Row, RowView, Table, ALL_FIELDS};

// =============================================================================
// Re-exports - Operations
// =============================================================================

pub use ops::{
    add_column, aggregate, apply_ops, case, coalesce, concat, convert, count, count_distinct, dense_rank, distinct,
    duplicates, filter, filter_where, head, inner_join, is_unique, join, join_on, lag, lead, left_join, melt, merge,
    ntile, percent_rank, pivot, rank, remove, rename, replace, right_join, row_number, running_sum, select, skip,
    slice, sort_by_fields, sort_with, sum, tail, transpose, union, unique, unpivot, when, BuiltinReducer, CaseBranch,
    Condition, JoinKind, LagLeadOptions, MeltOptions, PivotAggregation, Reducer, ValueOp, WindowSpec,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    filter_invalid, filter_valid, validate, validate_or_fail, Rule, RuleSet, RuleSpec, ValidationIssue,
    ValidationReport,
};

// =============================================================================
// Re-exports - Collaborators
// =============================================================================

pub use io::{Extract, JsonFileExtractor, JsonFileLoader, Load, LoadResult, MemoryExtractor, MemoryLoader};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{execute, PipelineRun, PipelineSpec, Step};
