//! Rule-based row validation.
//!
//! Rules are attached per field. [`validate`] runs every rule of every
//! field against every row and collects one [`ValidationIssue`] per
//! violation, so a report reads like:
//!
//! ```json
//! {
//!   "valid": false,
//!   "errors": [
//!     { "row": 2, "field": "age", "rule": "range", "message": "-1 is below minimum 0",
//!       "min": 0.0, "max": null, "value": -1 }
//!   ]
//! }
//! ```
//!
//! Row numbers are 1-based data-row positions. Issues are ordered by row,
//! then by field, then by rule, as declared.

mod rules;

pub use rules::{CellType, PredicateFn, Rule, RuleSpec};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashSet};

use crate::error::{EngineError, EngineResult};
use crate::models::{cell_at, Cell, Table};

/// Rules per field, evaluated in declaration order.
pub type RuleSet = IndexMap<String, Vec<Rule>>;

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// 1-based data row
    pub row: usize,
    pub field: String,
    pub rule: String,
    pub message: String,
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// 0-based positions of every row with at least one issue.
    pub fn invalid_rows(&self) -> BTreeSet<usize> {
        self.errors.iter().map(|e| e.row - 1).collect()
    }

    /// Issues grouped by field, fields in first-seen order.
    pub fn by_field(&self) -> IndexMap<&str, Vec<&ValidationIssue>> {
        let mut out: IndexMap<&str, Vec<&ValidationIssue>> = IndexMap::new();
        for issue in &self.errors {
            out.entry(issue.field.as_str()).or_default().push(issue);
        }
        out
    }
}

/// Run `rules` over every row. Unknown fields are fatal.
pub fn validate(table: &Table, rules: &RuleSet) -> EngineResult<ValidationReport> {
    let fields: Vec<(usize, &String, &Vec<Rule>)> = rules
        .iter()
        .map(|(field, list)| -> EngineResult<(usize, &String, &Vec<Rule>)> {
            Ok((table.field_index(field)?, field, list))
        })
        .collect::<EngineResult<_>>()?;

    // One seen-set per (field, rule) pair using `unique`
    let mut seen: Vec<Vec<HashSet<Cell>>> = fields
        .iter()
        .map(|(_, _, list)| list.iter().map(|_| HashSet::new()).collect())
        .collect();

    let mut errors = Vec::new();
    for (pos, row) in table.rows().iter().enumerate() {
        let view = table.view(row);
        for (f, (idx, field, list)) in fields.iter().enumerate() {
            let cell = cell_at(row, *idx);
            for (r, rule) in list.iter().enumerate() {
                let failure = match rule {
                    Rule::Unique => {
                        if cell.is_null() || seen[f][r].insert(cell.clone()) {
                            None
                        } else {
                            let mut context = Map::new();
                            context.insert("value".into(), Value::from(cell.clone()));
                            Some((format!("duplicate value {}", cell), context))
                        }
                    }
                    _ => rule.check(cell, &view),
                };
                if let Some((message, context)) = failure {
                    errors.push(ValidationIssue {
                        row: pos + 1,
                        field: (*field).clone(),
                        rule: rule.name().to_string(),
                        message,
                        context,
                    });
                }
            }
        }
    }
    Ok(ValidationReport::new(errors))
}

/// Like [`validate`] but any issue becomes [`EngineError::ValidationFailed`].
pub fn validate_or_fail(table: &Table, rules: &RuleSet) -> EngineResult<ValidationReport> {
    let report = validate(table, rules)?;
    if report.valid {
        Ok(report)
    } else {
        Err(EngineError::ValidationFailed {
            count: report.error_count(),
            errors: report.errors,
        })
    }
}

/// Rows not referenced by any issue.
pub fn filter_valid(table: &Table, rules: &RuleSet) -> EngineResult<Table> {
    partition(table, rules, false)
}

/// Rows referenced by at least one issue.
pub fn filter_invalid(table: &Table, rules: &RuleSet) -> EngineResult<Table> {
    partition(table, rules, true)
}

fn partition(table: &Table, rules: &RuleSet, invalid: bool) -> EngineResult<Table> {
    let report = validate(table, rules)?;
    Ok(rows_by_validity(table, &report, invalid))
}

/// Rows of `table` that `report` flags (`invalid == true`) or does not flag.
pub fn rows_by_validity(table: &Table, report: &ValidationReport, invalid: bool) -> Table {
    let bad = report.invalid_rows();
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(pos, _)| bad.contains(pos) == invalid)
        .map(|(_, row)| row.clone())
        .collect();
    table.with_rows(rows)
}

/// JSON summary used in pipeline logs.
pub fn summarize(report: &ValidationReport) -> Value {
    let per_field: Map<String, Value> = report
        .by_field()
        .into_iter()
        .map(|(field, issues)| (field.to_string(), json!(issues.len())))
        .collect();
    json!({
        "valid": report.valid,
        "errorCount": report.error_count(),
        "fields": per_field,
    })
}
