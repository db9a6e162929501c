//! Plan executor
//!
//! Runs a [`PipelineSpec`] over an input table, step by step.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::spec::PipelineSpec;
use super::step::{Step, ValidateMode};
use crate::error::{EngineError, EngineResult, PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::Table;
use crate::ops::{self, MeltOptions, PivotAggregation};
use crate::validation::{self, ValidationReport};

/// Outcome of [`execute`]
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Final table
    pub table: Table,
    /// Reports of every `validate` step, in order
    pub reports: Vec<ValidationReport>,
    pub steps_applied: usize,
    pub duration: Duration,
}

impl PipelineRun {
    /// True when every recorded report is valid
    pub fn is_valid(&self) -> bool {
        self.reports.iter().all(|r| r.valid)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} step(s), {} row(s), {} validation issue(s) in {:.1} ms",
            self.steps_applied,
            self.table.len(),
            self.reports.iter().map(ValidationReport::error_count).sum::<usize>(),
            self.duration.as_secs_f64() * 1000.0
        )
    }
}

/// Execute a plan on `input`. `tables` holds the named tables that join and
/// set-operation steps refer to.
pub fn execute(input: &Table, spec: &PipelineSpec, tables: &HashMap<String, Table>) -> PipelineResult<PipelineRun> {
    let started = Instant::now();

    for name in spec.referenced_tables() {
        if !tables.contains_key(&name) {
            return Err(PipelineError::UnknownTable(name));
        }
    }
    if let Err(missing) = spec.validate_headers(input.header()) {
        return Err(PipelineError::InvalidPlan(missing.join("; ")));
    }

    if !spec.description.is_empty() {
        log_info(format!("Pipeline: {}", spec.description));
    }
    log_info(format!(
        "Running {} step(s) on {} row(s) x {} column(s)",
        spec.steps.len(),
        input.len(),
        input.width()
    ));

    let mut table = input.clone();
    let mut reports = Vec::new();
    for (i, step) in spec.steps.iter().enumerate() {
        table = apply_step(&table, step, tables, &mut reports)?;
        log_info_indent(
            format!("[{}/{}] {} -> {} row(s)", i + 1, spec.steps.len(), step.name(), table.len()),
            1,
        );
    }

    let run = PipelineRun {
        table,
        reports,
        steps_applied: spec.steps.len(),
        duration: started.elapsed(),
    };
    if run.is_valid() {
        log_success(run.summary());
    } else {
        log_warning(run.summary());
    }
    Ok(run)
}

fn named<'a>(tables: &'a HashMap<String, Table>, name: &str) -> PipelineResult<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| PipelineError::UnknownTable(name.to_string()))
}

fn apply_step(
    table: &Table,
    step: &Step,
    tables: &HashMap<String, Table>,
    reports: &mut Vec<ValidationReport>,
) -> PipelineResult<Table> {
    let out = match step {
        Step::Head { n } => ops::head(table, *n),
        Step::Tail { n } => ops::tail(table, *n),
        Step::Slice { start, end } => ops::slice(table, *start, *end),
        Step::Skip { n } => ops::skip(table, *n),
        Step::Filter { field, condition } => ops::filter_where(table, field, condition)?,
        Step::Sort { fields, descending } => ops::sort_by_fields(table, fields, *descending)?,

        Step::Distinct { fields } => ops::distinct(table, fields)?,
        Step::Duplicates { fields } => ops::duplicates(table, fields)?,
        Step::CountDistinct { fields, target } => ops::count_distinct(table, fields, target)?,

        Step::Select { fields } => ops::select(table, fields)?,
        Step::Remove { fields } => ops::remove(table, fields)?,
        Step::Rename { mapping } => ops::rename(table, mapping)?,
        Step::Replace { field, from, to } => ops::replace(table, field, from, to)?,
        Step::Apply { field, ops: chain } => ops::apply_ops(table, field, chain)?,
        Step::Constant { target, value } => ops::add_column(table, target, |_| value.clone()),
        Step::Coalesce { fields, target } => ops::coalesce(table, fields, target)?,
        Step::When {
            target,
            field,
            condition,
            then,
            otherwise,
        } => {
            table.field_index(field)?;
            ops::when(
                table,
                target,
                |row| condition.matches(row.value(field)),
                then.clone(),
                otherwise.clone(),
            )
        }

        Step::Concat { tables: names } => {
            let mut all = vec![table];
            for name in names {
                all.push(named(tables, name)?);
            }
            ops::concat(&all)?
        }
        Step::Union { table: name } => ops::union(table, named(tables, name)?)?,
        Step::Merge { tables: names } => {
            let mut all = vec![table];
            for name in names {
                all.push(named(tables, name)?);
            }
            ops::merge(&all)
        }
        Step::Join {
            table: name,
            keys,
            right_keys,
            kind,
        } => {
            let right = named(tables, name)?;
            if right_keys.is_empty() {
                ops::join(table, right, *kind, keys)?
            } else {
                ops::join_on(table, right, *kind, keys, right_keys)?
            }
        }

        Step::Aggregate { group_by, reducers } => {
            let built = reducers
                .iter()
                .map(|(name, spec)| spec.build().map(|reducer| (name.as_str(), reducer)))
                .collect::<EngineResult<Vec<_>>>()?;
            ops::aggregate(table, group_by, &built)?
        }
        Step::Count { group_by } => ops::count(table, group_by)?,
        Step::Sum { field, group_by } => ops::sum(table, field, group_by)?,

        Step::Unpivot {
            id_fields,
            value_fields,
            variable_column,
            value_column,
        } => {
            let options = MeltOptions {
                variable_column: variable_column.clone(),
                value_column: value_column.clone(),
            };
            ops::unpivot(table, id_fields, value_fields, &options)?
        }
        Step::Pivot {
            index,
            column,
            value,
            aggregation,
        } => {
            let aggregation = aggregation.as_deref().map(PivotAggregation::from_name).transpose()?;
            ops::pivot(table, index, column, value, aggregation.as_ref())?
        }
        Step::Transpose => ops::transpose(table),

        Step::Lag {
            field,
            target,
            options,
            window,
        } => ops::lag(table, field, target, options, window)?,
        Step::Lead {
            field,
            target,
            options,
            window,
        } => ops::lead(table, field, target, options, window)?,
        Step::RowNumber { target, window } => ops::row_number(table, target, window)?,
        Step::Rank { target, window } => ops::rank(table, target, window)?,
        Step::DenseRank { target, window } => ops::dense_rank(table, target, window)?,
        Step::PercentRank { target, window } => ops::percent_rank(table, target, window)?,
        Step::Ntile {
            buckets,
            target,
            window,
        } => ops::ntile(table, *buckets, target, window)?,
        Step::RunningSum { field, target, window } => ops::running_sum(table, field, target, window)?,

        Step::Validate { rules, mode } => {
            let rules = Step::build_rules(rules)?;
            let report = validation::validate(table, &rules)?;
            if !report.valid {
                log_warning(format!(
                    "Validation found {} issue(s): {}",
                    report.error_count(),
                    validation::summarize(&report)
                ));
            }
            let out = match mode {
                ValidateMode::Report => table.clone(),
                ValidateMode::Fail if !report.valid => {
                    return Err(EngineError::ValidationFailed {
                        count: report.error_count(),
                        errors: report.errors,
                    }
                    .into());
                }
                ValidateMode::Fail => table.clone(),
                ValidateMode::KeepValid => validation::rows_by_validity(table, &report, false),
                ValidateMode::KeepInvalid => validation::rows_by_validity(table, &report, true),
            };
            reports.push(report);
            out
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use serde_json::json;

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

    fn tables() -> HashMap<String, Table> {
        HashMap::from([("ages".to_string(), ages())])
    }

    #[test]
    fn test_left_join_then_fill() {
        let spec = PipelineSpec::from_value(&json!({
            "steps": [
                { "type": "join", "table": "ages", "keys": ["id"], "kind": "left" },
                { "type": "when", "target": "known", "field": "age",
                  "condition": { "op": "is_not_null" }, "then": true, "otherwise": false }
            ]
        }))
        .unwrap();

        let run = execute(&people(), &spec, &tables()).unwrap();
        assert_eq!(run.steps_applied, 2);
        assert_eq!(run.table.header(), &["id", "name", "age", "known"]);
        assert_eq!(
            run.table.rows(),
            &[
                vec![Cell::Int(1), Cell::from("Alice"), Cell::Int(25), Cell::Bool(true)],
                vec![Cell::Int(2), Cell::from("Bob"), Cell::Null, Cell::Bool(false)],
            ]
        );
    }

    #[test]
    fn test_aggregate_and_rank() {
        let sales = Table::from_records(&[
            json!({ "dept": "Sales", "amt": 100 }),
            json!({ "dept": "Sales", "amt": 150 }),
            json!({ "dept": "IT", "amt": 200 }),
        ])
        .unwrap();
        let spec = PipelineSpec::from_value(&json!({
            "steps": [
                { "type": "aggregate", "group_by": ["dept"],
                  "reducers": { "total": { "op": "sum", "field": "amt" } } },
                { "type": "rank", "target": "pos", "order_by": ["total"], "descending": true }
            ]
        }))
        .unwrap();

        let run = execute(&sales, &spec, &HashMap::new()).unwrap();
        assert_eq!(
            run.table.rows(),
            &[
                vec![Cell::from("Sales"), Cell::Int(250), Cell::Int(1)],
                vec![Cell::from("IT"), Cell::Int(200), Cell::Int(2)],
            ]
        );
    }

    #[test]
    fn test_validate_modes() {
        let plan = |mode: &str| {
            PipelineSpec::from_value(&json!({
                "steps": [
                    { "type": "join", "table": "ages", "keys": ["id"], "kind": "left" },
                    { "type": "validate", "mode": mode,
                      "rules": { "age": [{ "rule": "required" }] } }
                ]
            }))
            .unwrap()
        };

        let report = execute(&people(), &plan("report"), &tables()).unwrap();
        assert_eq!(report.table.len(), 2);
        assert!(!report.is_valid());
        assert_eq!(report.reports[0].errors[0].row, 2);

        let kept = execute(&people(), &plan("keep_valid"), &tables()).unwrap();
        assert_eq!(kept.table.column("name").unwrap(), vec![Cell::from("Alice")]);

        assert!(matches!(
            execute(&people(), &plan("fail"), &tables()),
            Err(PipelineError::Engine(EngineError::ValidationFailed { count: 1, .. }))
        ));
    }

    #[test]
    fn test_plan_errors_before_running() {
        let spec = PipelineSpec::from_value(&json!({
            "steps": [{ "type": "union", "table": "archive" }]
        }))
        .unwrap();
        assert!(matches!(
            execute(&people(), &spec, &tables()),
            Err(PipelineError::UnknownTable(name)) if name == "archive"
        ));

        let spec = PipelineSpec::from_value(&json!({
            "steps": [{ "type": "select", "fields": ["email"] }]
        }))
        .unwrap();
        assert!(matches!(
            execute(&people(), &spec, &tables()),
            Err(PipelineError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_reshape_steps() {
        let long = Table::from_rows(
            &["id", "type", "value"],
            vec![
                vec![Cell::Int(1), Cell::from("A"), Cell::Int(10)],
                vec![Cell::Int(1), Cell::from("A"), Cell::Int(20)],
                vec![Cell::Int(1), Cell::from("B"), Cell::Int(30)],
            ],
        );
        let spec = PipelineSpec::from_value(&json!({
            "steps": [
                { "type": "pivot", "index": ["id"], "column": "type", "value": "value", "aggregation": "sum" }
            ]
        }))
        .unwrap();

        let run = execute(&long, &spec, &HashMap::new()).unwrap();
        assert_eq!(run.table.header(), &["id", "A", "B"]);
        assert_eq!(run.table.rows(), &[vec![Cell::Int(1), Cell::Int(30), Cell::Int(30)]]);
    }
}
