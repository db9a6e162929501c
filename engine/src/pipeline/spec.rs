//! Pipeline plan definition
//!
//! A plan is an ordered list of [`Step`]s applied to one input table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::step::Step;

/// A complete step plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Version of the plan format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Steps, applied in order
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl PipelineSpec {
    /// Create an empty plan
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse a plan from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a plan from JSON value
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Named tables the plan reads, deduplicated, in first-use order
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for name in self.steps.iter().flat_map(Step::tables) {
            if !tables.iter().any(|t| t == name) {
                tables.push(name.to_string());
            }
        }
        tables
    }

    /// Check the columns each step reads against the header it will see.
    ///
    /// The header is carried forward step by step; checking stops at the
    /// first step whose output header depends on the data (pivot,
    /// transpose) or on another table (join, merge).
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), Vec<String>> {
        let mut current = headers.to_vec();
        let mut missing: Vec<String> = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            for field in step.fields() {
                if !current.iter().any(|h| h == field) {
                    missing.push(format!("step {} ({}): column '{}'", i + 1, step.name(), field));
                }
            }
            match step.output_header(&current) {
                Some(next) => current = next,
                None => break,
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_from_json() {
        let spec = PipelineSpec::from_value(&json!({
            "description": "adults with ages",
            "steps": [
                { "type": "filter", "field": "age", "condition": { "op": "gte", "value": 18 } },
                { "type": "join", "table": "ages", "keys": ["id"], "kind": "left" },
                { "type": "concat", "tables": ["archive", "ages"] }
            ]
        }))
        .unwrap();

        assert_eq!(spec.version, "1.0");
        assert_eq!(spec.steps.len(), 3);
        assert_eq!(spec.referenced_tables(), vec!["ages", "archive"]);
    }

    #[test]
    fn test_json_roundtrip() {
        let spec = PipelineSpec::new()
            .with_step(Step::Head { n: 3 })
            .with_step(Step::Distinct { fields: vec![] });
        let json = spec.to_json().unwrap();
        assert_eq!(PipelineSpec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn test_validate_headers_follows_renames() {
        let spec = PipelineSpec::from_value(&json!({
            "steps": [
                { "type": "rename", "mapping": { "amt": "amount" } },
                { "type": "sum", "field": "amount", "group_by": ["dept"] },
                { "type": "sort", "fields": ["amt"] }
            ]
        }))
        .unwrap();

        let errors = spec.validate_headers(&headers(&["dept", "amt"])).unwrap_err();
        assert_eq!(errors, vec!["step 3 (sort): column 'amt'"]);
        assert!(spec.validate_headers(&headers(&["dept"])).is_err());
    }

    #[test]
    fn test_validate_headers_stops_at_data_dependent_step() {
        let spec = PipelineSpec::from_value(&json!({
            "steps": [
                { "type": "pivot", "index": ["id"], "column": "type", "value": "v" },
                { "type": "select", "fields": ["A"] }
            ]
        }))
        .unwrap();
        assert!(spec.validate_headers(&headers(&["id", "type", "v"])).is_ok());
    }
}
