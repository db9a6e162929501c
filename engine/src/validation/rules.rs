//! Per-field validation rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::models::{Cell, RowView};

/// Predicate for [`Rule::Custom`]: the cell under test plus its whole row.
pub type PredicateFn = Arc<dyn Fn(&Cell, &RowView<'_>) -> bool + Send + Sync>;

/// Runtime types accepted by [`Rule::Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Int,
    /// Any number, integral or not
    #[serde(alias = "number")]
    Float,
    String,
    Bool,
    Array,
    Object,
    Null,
}

impl CellType {
    pub fn from_name(name: &str) -> EngineResult<Self> {
        match name.to_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "string" | "text" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            "array" | "list" => Ok(Self::Array),
            "object" | "map" => Ok(Self::Object),
            "null" => Ok(Self::Null),
            other => Err(EngineError::invalid(format!("unknown type name '{}'", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }

    pub fn accepts(&self, cell: &Cell) -> bool {
        match self {
            Self::Int => matches!(cell, Cell::Int(_)),
            Self::Float => cell.is_numeric(),
            Self::String => matches!(cell, Cell::Text(_)),
            Self::Bool => matches!(cell, Cell::Bool(_)),
            Self::Array => matches!(cell, Cell::List(_)),
            Self::Object => matches!(cell, Cell::Map(_)),
            Self::Null => cell.is_null(),
        }
    }
}

/// A single check applied to one field of every row.
///
/// `range`, `pattern` and `in` skip Null cells; pair them with `required`
/// to reject missing values. `type` checks Null like any other value.
#[derive(Clone)]
pub enum Rule {
    /// Non-null and not an empty string
    Required,
    Type(CellType),
    Range { min: Option<f64>, max: Option<f64> },
    Pattern(Regex),
    In(Vec<Cell>),
    /// Second and later occurrences of a non-null value are violations
    Unique,
    Custom { predicate: PredicateFn, message: String },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "Required"),
            Rule::Type(t) => write!(f, "Type({})", t.name()),
            Rule::Range { min, max } => write!(f, "Range({:?}..{:?})", min, max),
            Rule::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
            Rule::In(values) => write!(f, "In({:?})", values),
            Rule::Unique => write!(f, "Unique"),
            Rule::Custom { message, .. } => write!(f, "Custom({})", message),
        }
    }
}

impl Rule {
    pub fn required() -> Self {
        Rule::Required
    }

    pub fn of_type(name: &str) -> EngineResult<Self> {
        Ok(Rule::Type(CellType::from_name(name)?))
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> EngineResult<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(EngineError::invalid(format!("range min {} exceeds max {}", lo, hi)));
            }
        }
        if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
            return Err(EngineError::invalid("range bounds must be numbers"));
        }
        Ok(Rule::Range { min, max })
    }

    pub fn pattern(pattern: &str) -> EngineResult<Self> {
        let re = Regex::new(pattern).map_err(|e| EngineError::invalid(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Rule::Pattern(re))
    }

    pub fn one_of<I, C>(values: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        Rule::In(values.into_iter().map(Into::into).collect())
    }

    pub fn unique() -> Self {
        Rule::Unique
    }

    pub fn custom<F>(message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Cell, &RowView<'_>) -> bool + Send + Sync + 'static,
    {
        Rule::Custom {
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }

    /// Rule name as it appears in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Type(_) => "type",
            Rule::Range { .. } => "range",
            Rule::Pattern(_) => "pattern",
            Rule::In(_) => "in",
            Rule::Unique => "unique",
            Rule::Custom { .. } => "custom",
        }
    }

    /// Stateless check. `None` when the cell passes, otherwise the message
    /// and rule-specific context. `unique` is handled by the validator.
    pub(crate) fn check(&self, cell: &Cell, row: &RowView<'_>) -> Option<(String, Map<String, Value>)> {
        let mut context = Map::new();
        let message = match self {
            Rule::Required => {
                let missing = cell.is_null() || cell.as_str().is_some_and(str::is_empty);
                if !missing {
                    return None;
                }
                "value is required".to_string()
            }
            Rule::Type(expected) => {
                if expected.accepts(cell) {
                    return None;
                }
                context.insert("expected".into(), json!(expected.name()));
                context.insert("actual".into(), json!(cell.type_name()));
                format!("expected {}, got {}", expected.name(), cell.type_name())
            }
            Rule::Range { min, max } => {
                if cell.is_null() {
                    return None;
                }
                context.insert("min".into(), json!(min));
                context.insert("max".into(), json!(max));
                context.insert("value".into(), Value::from(cell.clone()));
                match cell.as_f64() {
                    None => format!("expected a number, got {}", cell.type_name()),
                    Some(v) if min.is_some_and(|lo| v < lo) => format!("{} is below minimum {}", cell, min.unwrap_or_default()),
                    Some(v) if max.is_some_and(|hi| v > hi) => format!("{} is above maximum {}", cell, max.unwrap_or_default()),
                    Some(_) => return None,
                }
            }
            Rule::Pattern(re) => {
                if cell.is_null() {
                    return None;
                }
                let text = cell.to_string();
                if re.is_match(&text) {
                    return None;
                }
                context.insert("pattern".into(), json!(re.as_str()));
                format!("'{}' does not match pattern {}", text, re.as_str())
            }
            Rule::In(allowed) => {
                if cell.is_null() || allowed.contains(cell) {
                    return None;
                }
                context.insert("allowed".into(), Value::Array(allowed.iter().cloned().map(Value::from).collect()));
                format!("{} is not an allowed value", cell)
            }
            Rule::Unique => return None,
            Rule::Custom { predicate, message } => {
                if predicate(cell, row) {
                    return None;
                }
                message.clone()
            }
        };
        Some((message, context))
    }
}

/// Serializable form of every built-in rule except `custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleSpec {
    Required,
    Type {
        name: String,
    },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Pattern {
        pattern: String,
    },
    In {
        values: Vec<Cell>,
    },
    Unique,
}

impl RuleSpec {
    pub fn build(&self) -> EngineResult<Rule> {
        match self {
            RuleSpec::Required => Ok(Rule::required()),
            RuleSpec::Type { name } => Rule::of_type(name),
            RuleSpec::Range { min, max } => Rule::range(*min, *max),
            RuleSpec::Pattern { pattern } => Rule::pattern(pattern),
            RuleSpec::In { values } => Ok(Rule::In(values.clone())),
            RuleSpec::Unique => Ok(Rule::unique()),
        }
    }
}
