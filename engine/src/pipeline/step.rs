//! Pipeline steps
//!
//! Each variant maps onto one engine operation. Steps are written as JSON
//! objects tagged by `type`:
//!
//! ```json
//! { "type": "filter", "field": "age", "condition": { "op": "gte", "value": 18 } }
//! { "type": "join", "table": "ages", "keys": ["id"], "kind": "left" }
//! { "type": "rank", "target": "rank", "order_by": ["score"], "descending": true }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::models::Cell;
use crate::ops::{BuiltinReducer, Condition, JoinKind, LagLeadOptions, Reducer, ValueOp, WindowSpec};
use crate::validation::{Rule, RuleSet, RuleSpec};

/// A single transformation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    // Row selection
    Head {
        n: usize,
    },
    Tail {
        n: usize,
    },
    Slice {
        start: usize,
        end: usize,
    },
    Skip {
        n: usize,
    },
    Filter {
        field: String,
        condition: Condition,
    },
    Sort {
        #[serde(default)]
        fields: Vec<String>,
        #[serde(default)]
        descending: bool,
    },

    // Dedup
    Distinct {
        #[serde(default)]
        fields: Vec<String>,
    },
    Duplicates {
        #[serde(default)]
        fields: Vec<String>,
    },
    CountDistinct {
        #[serde(default)]
        fields: Vec<String>,
        #[serde(default = "default_count_column")]
        target: String,
    },

    // Columns and values
    Select {
        fields: Vec<String>,
    },
    Remove {
        fields: Vec<String>,
    },
    Rename {
        mapping: IndexMap<String, String>,
    },
    Replace {
        field: String,
        from: Cell,
        to: Cell,
    },
    Apply {
        field: String,
        ops: Vec<ValueOp>,
    },
    Constant {
        target: String,
        value: Cell,
    },
    Coalesce {
        fields: Vec<String>,
        target: String,
    },
    When {
        target: String,
        field: String,
        condition: Condition,
        then: Cell,
        #[serde(default)]
        otherwise: Cell,
    },

    // Set operations and joins against named tables
    Concat {
        tables: Vec<String>,
    },
    Union {
        table: String,
    },
    Merge {
        tables: Vec<String>,
    },
    Join {
        table: String,
        keys: Vec<String>,
        /// Key names in the named table when they differ from `keys`
        #[serde(default)]
        right_keys: Vec<String>,
        #[serde(default = "default_join_kind")]
        kind: JoinKind,
    },

    // Aggregation
    Aggregate {
        #[serde(default)]
        group_by: Vec<String>,
        reducers: IndexMap<String, ReducerSpec>,
    },
    Count {
        #[serde(default)]
        group_by: Vec<String>,
    },
    Sum {
        field: String,
        #[serde(default)]
        group_by: Vec<String>,
    },

    // Reshaping
    Unpivot {
        id_fields: Vec<String>,
        #[serde(default)]
        value_fields: Vec<String>,
        #[serde(default = "default_variable_column")]
        variable_column: String,
        #[serde(default = "default_value_column")]
        value_column: String,
    },
    Pivot {
        index: Vec<String>,
        column: String,
        value: String,
        #[serde(default)]
        aggregation: Option<String>,
    },
    Transpose,

    // Window functions
    Lag {
        field: String,
        target: String,
        #[serde(flatten)]
        options: LagLeadOptions,
        #[serde(flatten)]
        window: WindowSpec,
    },
    Lead {
        field: String,
        target: String,
        #[serde(flatten)]
        options: LagLeadOptions,
        #[serde(flatten)]
        window: WindowSpec,
    },
    RowNumber {
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },
    Rank {
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },
    DenseRank {
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },
    PercentRank {
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },
    Ntile {
        buckets: usize,
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },
    RunningSum {
        field: String,
        target: String,
        #[serde(flatten)]
        window: WindowSpec,
    },

    // Validation
    Validate {
        rules: IndexMap<String, Vec<RuleSpec>>,
        #[serde(default)]
        mode: ValidateMode,
    },
}

fn default_count_column() -> String {
    "count".to_string()
}

fn default_join_kind() -> JoinKind {
    JoinKind::Inner
}

fn default_variable_column() -> String {
    "variable".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

/// Reducer in a plan: a bare built-in name, or a built-in scoped to a field.
///
/// ```json
/// { "rows": "count", "total": { "op": "sum", "field": "amount" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReducerSpec {
    Named(String),
    Field { op: String, field: String },
}

impl ReducerSpec {
    pub fn build(&self) -> EngineResult<Reducer> {
        match self {
            ReducerSpec::Named(name) => Reducer::named(name),
            ReducerSpec::Field { op, field } => Ok(Reducer::on(BuiltinReducer::from_name(op)?, field.clone())),
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            ReducerSpec::Named(_) => None,
            ReducerSpec::Field { field, .. } => Some(field.as_str()),
        }
    }
}

/// What a `validate` step does with its report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateMode {
    /// Keep every row, record the report
    #[default]
    Report,
    /// Abort the run on any issue
    Fail,
    /// Keep rows without issues
    KeepValid,
    /// Keep rows with issues
    KeepInvalid,
}

impl Step {
    /// Step name as written in plans.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Head { .. } => "head",
            Step::Tail { .. } => "tail",
            Step::Slice { .. } => "slice",
            Step::Skip { .. } => "skip",
            Step::Filter { .. } => "filter",
            Step::Sort { .. } => "sort",
            Step::Distinct { .. } => "distinct",
            Step::Duplicates { .. } => "duplicates",
            Step::CountDistinct { .. } => "count_distinct",
            Step::Select { .. } => "select",
            Step::Remove { .. } => "remove",
            Step::Rename { .. } => "rename",
            Step::Replace { .. } => "replace",
            Step::Apply { .. } => "apply",
            Step::Constant { .. } => "constant",
            Step::Coalesce { .. } => "coalesce",
            Step::When { .. } => "when",
            Step::Concat { .. } => "concat",
            Step::Union { .. } => "union",
            Step::Merge { .. } => "merge",
            Step::Join { .. } => "join",
            Step::Aggregate { .. } => "aggregate",
            Step::Count { .. } => "count",
            Step::Sum { .. } => "sum",
            Step::Unpivot { .. } => "unpivot",
            Step::Pivot { .. } => "pivot",
            Step::Transpose => "transpose",
            Step::Lag { .. } => "lag",
            Step::Lead { .. } => "lead",
            Step::RowNumber { .. } => "row_number",
            Step::Rank { .. } => "rank",
            Step::DenseRank { .. } => "dense_rank",
            Step::PercentRank { .. } => "percent_rank",
            Step::Ntile { .. } => "ntile",
            Step::RunningSum { .. } => "running_sum",
            Step::Validate { .. } => "validate",
        }
    }

    /// Named tables this step reads besides its input.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Step::Concat { tables } | Step::Merge { tables } => tables.iter().map(String::as_str).collect(),
            Step::Union { table } | Step::Join { table, .. } => vec![table.as_str()],
            _ => Vec::new(),
        }
    }

    /// Input columns this step reads.
    pub fn fields(&self) -> Vec<&str> {
        fn all(fields: &[String]) -> impl Iterator<Item = &str> {
            fields.iter().map(String::as_str)
        }

        match self {
            Step::Head { .. }
            | Step::Tail { .. }
            | Step::Slice { .. }
            | Step::Skip { .. }
            | Step::Constant { .. }
            | Step::Concat { .. }
            | Step::Union { .. }
            | Step::Merge { .. }
            | Step::Transpose => Vec::new(),
            Step::Filter { field, .. }
            | Step::Replace { field, .. }
            | Step::Apply { field, .. }
            | Step::When { field, .. } => vec![field.as_str()],
            Step::Sort { fields, .. }
            | Step::Distinct { fields }
            | Step::Duplicates { fields }
            | Step::CountDistinct { fields, .. }
            | Step::Select { fields }
            | Step::Remove { fields }
            | Step::Coalesce { fields, .. } => all(fields).collect(),
            Step::Rename { mapping } => mapping.keys().map(String::as_str).collect(),
            Step::Join { keys, .. } => all(keys).collect(),
            Step::Aggregate { group_by, reducers } => all(group_by)
                .chain(reducers.values().filter_map(ReducerSpec::field))
                .collect(),
            Step::Count { group_by } => all(group_by).collect(),
            Step::Sum { field, group_by } => std::iter::once(field.as_str()).chain(all(group_by)).collect(),
            Step::Unpivot { id_fields, value_fields, .. } => all(id_fields).chain(all(value_fields)).collect(),
            Step::Pivot { index, column, value, .. } => all(index).chain([column.as_str(), value.as_str()]).collect(),
            Step::Lag { field, window, .. }
            | Step::Lead { field, window, .. }
            | Step::RunningSum { field, window, .. } => std::iter::once(field.as_str())
                .chain(all(&window.partition_by))
                .chain(all(&window.order_by))
                .collect(),
            Step::RowNumber { window, .. }
            | Step::Rank { window, .. }
            | Step::DenseRank { window, .. }
            | Step::PercentRank { window, .. }
            | Step::Ntile { window, .. } => all(&window.partition_by).chain(all(&window.order_by)).collect(),
            Step::Validate { rules, .. } => rules.keys().map(String::as_str).collect(),
        }
    }

    /// Output header given the input header, or `None` when it depends on
    /// the data or on another table.
    pub fn output_header(&self, header: &[String]) -> Option<Vec<String>> {
        let with = |target: &str| {
            let mut out = header.to_vec();
            if !out.iter().any(|h| h == target) {
                out.push(target.to_string());
            }
            Some(out)
        };

        match self {
            Step::Head { .. }
            | Step::Tail { .. }
            | Step::Slice { .. }
            | Step::Skip { .. }
            | Step::Filter { .. }
            | Step::Sort { .. }
            | Step::Distinct { .. }
            | Step::Duplicates { .. }
            | Step::Replace { .. }
            | Step::Apply { .. }
            | Step::Concat { .. }
            | Step::Union { .. }
            | Step::Validate { .. } => Some(header.to_vec()),
            Step::CountDistinct { fields, target } => {
                let mut out = if fields.is_empty() { header.to_vec() } else { fields.clone() };
                out.push(target.clone());
                Some(out)
            }
            Step::Select { fields } => Some(fields.clone()),
            Step::Remove { fields } => Some(header.iter().filter(|h| !fields.contains(h)).cloned().collect()),
            Step::Rename { mapping } => Some(
                header
                    .iter()
                    .map(|h| mapping.get(h).cloned().unwrap_or_else(|| h.clone()))
                    .collect(),
            ),
            Step::Constant { target, .. } | Step::Coalesce { target, .. } | Step::When { target, .. } => with(target),
            Step::Lag { target, .. }
            | Step::Lead { target, .. }
            | Step::RowNumber { target, .. }
            | Step::Rank { target, .. }
            | Step::DenseRank { target, .. }
            | Step::PercentRank { target, .. }
            | Step::Ntile { target, .. }
            | Step::RunningSum { target, .. } => with(target),
            Step::Aggregate { group_by, reducers } => {
                Some(group_by.iter().chain(reducers.keys()).cloned().collect())
            }
            Step::Count { group_by } => {
                let mut out = group_by.clone();
                out.push("count".to_string());
                Some(out)
            }
            Step::Sum { field, group_by } => {
                let mut out = group_by.clone();
                out.push(field.clone());
                Some(out)
            }
            Step::Unpivot {
                id_fields,
                variable_column,
                value_column,
                ..
            } => {
                let mut out = id_fields.clone();
                out.push(variable_column.clone());
                out.push(value_column.clone());
                Some(out)
            }
            Step::Merge { .. } | Step::Join { .. } | Step::Pivot { .. } | Step::Transpose => None,
        }
    }

    /// Build the rule set of a `validate` step.
    pub(crate) fn build_rules(rules: &IndexMap<String, Vec<RuleSpec>>) -> EngineResult<RuleSet> {
        rules
            .iter()
            .map(|(field, specs)| -> EngineResult<(String, Vec<Rule>)> {
                let built = specs.iter().map(RuleSpec::build).collect::<EngineResult<Vec<_>>>()?;
                Ok((field.clone(), built))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_steps_from_json() {
        let steps: Vec<Step> = serde_json::from_value(json!([
            { "type": "head", "n": 5 },
            { "type": "filter", "field": "age", "condition": { "op": "gte", "value": 18 } },
            { "type": "join", "table": "ages", "keys": ["id"] },
            { "type": "lag", "field": "v", "target": "prev", "partition_by": ["k"] },
            { "type": "rank", "target": "r", "order_by": ["score"], "descending": true },
            { "type": "transpose" }
        ]))
        .unwrap();

        assert_eq!(steps[0], Step::Head { n: 5 });
        assert_eq!(
            steps[1],
            Step::Filter {
                field: "age".into(),
                condition: Condition::Gte(Cell::Int(18)),
            }
        );
        assert!(matches!(&steps[2], Step::Join { kind: JoinKind::Inner, right_keys, .. } if right_keys.is_empty()));
        match &steps[3] {
            Step::Lag { options, window, .. } => {
                assert_eq!(options, &LagLeadOptions::default());
                assert_eq!(window, &WindowSpec::new().partition_by("k"));
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &steps[4] {
            Step::Rank { window, .. } => assert!(window.descending),
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(steps[5].name(), "transpose");
    }

    #[test]
    fn test_reducer_spec_forms() {
        let reducers: IndexMap<String, ReducerSpec> =
            serde_json::from_value(json!({ "n": "count", "total": { "op": "sum", "field": "amt" } })).unwrap();
        assert_eq!(reducers["n"], ReducerSpec::Named("count".into()));
        assert!(matches!(
            reducers["total"].build().unwrap(),
            Reducer::Field { op: BuiltinReducer::Sum, .. }
        ));
        assert!(ReducerSpec::Named("median".into()).build().is_err());
    }

    #[test]
    fn test_fields_and_output_header() {
        let header: Vec<String> = vec!["id".into(), "dept".into(), "amt".into()];
        let step = Step::Aggregate {
            group_by: vec!["dept".into()],
            reducers: IndexMap::from([(
                "total".to_string(),
                ReducerSpec::Field {
                    op: "sum".into(),
                    field: "amt".into(),
                },
            )]),
        };
        assert_eq!(step.fields(), vec!["dept", "amt"]);
        assert_eq!(step.output_header(&header).unwrap(), vec!["dept", "total"]);

        let rename = Step::Rename {
            mapping: IndexMap::from([("amt".to_string(), "amount".to_string())]),
        };
        assert_eq!(rename.output_header(&header).unwrap(), vec!["id", "dept", "amount"]);
        assert!(Step::Transpose.output_header(&header).is_none());
    }
}
