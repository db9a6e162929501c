//! Declarative step plans
//!
//! This module provides:
//! - `spec`: plan definition, parsed from JSON
//! - `step`: the available steps
//! - `executor`: run a plan over a table
//!
//! ## Usage Flow
//!
//! ```text
//! JSON plan → PipelineSpec::from_json → validate_headers → execute → PipelineRun
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowframe::pipeline::{execute, PipelineSpec};
//! use std::collections::HashMap;
//!
//! let spec = PipelineSpec::from_json(r#"{
//!     "steps": [
//!         { "type": "join", "table": "ages", "keys": ["id"], "kind": "left" },
//!         { "type": "sort", "fields": ["age"], "descending": true }
//!     ]
//! }"#)?;
//!
//! let tables = HashMap::from([("ages".to_string(), ages)]);
//! let run = execute(&people, &spec, &tables)?;
//! println!("{} rows", run.table.len());
//! ```

pub mod executor;
pub mod spec;
pub mod step;

pub use executor::{execute, PipelineRun};
pub use spec::PipelineSpec;
pub use step::{ReducerSpec, Step, ValidateMode};
