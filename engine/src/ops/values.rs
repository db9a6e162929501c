//! Per-cell value operations.
//!
//! String operations apply to text cells (numbers and bools are rendered to
//! text first); conversions accept any scalar. Lists, maps and nulls pass
//! through untouched unless noted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::models::Cell;

/// A single value transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueOp {
    Trim,
    Uppercase,
    Lowercase,

    /// Regex replacement over the whole text
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    EnsurePrefix { value: String },

    EnsureSuffix { value: String },

    /// Lookup table; unmapped values become `default_unmapped` or stay as they are
    Map {
        mapping: HashMap<String, Cell>,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(default)]
        default_unmapped: Option<Cell>,
    },

    /// Text into a list of trimmed parts
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Parse to integer; unparseable input becomes Null
    ToInt,

    /// Parse to float; unparseable input becomes Null
    ToFloat,

    /// Render any non-null cell as text
    ToText,

    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    Alphanumeric,

    DigitsOnly,
}

fn default_pad_char() -> String {
    " ".to_string()
}

fn default_split_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y", "on"].iter().map(|s| s.to_string()).collect()
}

/// A [`ValueOp`] with its regex compiled, for running over many cells.
#[derive(Debug, Clone)]
pub struct PreparedOp<'a> {
    op: &'a ValueOp,
    regex: Option<Regex>,
}

impl PreparedOp<'_> {
    pub fn apply(&self, cell: &Cell) -> Cell {
        self.op.apply_with(cell, self.regex.as_ref())
    }
}

impl ValueOp {
    /// Reject ops that can never run (bad regex).
    pub fn check(&self) -> EngineResult<()> {
        self.prepare().map(|_| ())
    }

    /// Compile whatever the op needs once, up front.
    pub fn prepare(&self) -> EngineResult<PreparedOp<'_>> {
        let regex = match self {
            ValueOp::Replace { pattern, .. } => Some(
                Regex::new(pattern).map_err(|e| EngineError::invalid(format!("bad pattern '{}': {}", pattern, e)))?,
            ),
            _ => None,
        };
        Ok(PreparedOp { op: self, regex })
    }

    /// Apply this operation to a cell. A `replace` with a bad pattern
    /// leaves the cell unchanged.
    pub fn apply(&self, cell: &Cell) -> Cell {
        match self.prepare() {
            Ok(prepared) => prepared.apply(cell),
            Err(_) => cell.clone(),
        }
    }

    fn apply_with(&self, cell: &Cell, regex: Option<&Regex>) -> Cell {
        match self {
            ValueOp::Trim => map_text(cell, |s| s.trim().to_string()),
            ValueOp::Uppercase => map_text(cell, |s| s.to_uppercase()),
            ValueOp::Lowercase => map_text(cell, |s| s.to_lowercase()),
            ValueOp::Replace { value, .. } => match regex {
                Some(re) => map_text(cell, |s| re.replace_all(s, value.as_str()).into_owned()),
                None => cell.clone(),
            },
            ValueOp::PadStart { length, char } => map_text(cell, |s| pad(s, *length, char, true)),
            ValueOp::PadEnd { length, char } => map_text(cell, |s| pad(s, *length, char, false)),
            ValueOp::EnsurePrefix { value } => map_text(cell, |s| {
                if s.starts_with(value.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", value, s)
                }
            }),
            ValueOp::EnsureSuffix { value } => map_text(cell, |s| {
                if s.ends_with(value.as_str()) {
                    s.to_string()
                } else {
                    format!("{}{}", s, value)
                }
            }),
            ValueOp::Map { mapping, case_insensitive, default_unmapped } => {
                apply_map(cell, mapping, *case_insensitive, default_unmapped.as_ref())
            }
            ValueOp::Split { separator } => match scalar_text(cell) {
                Some(s) => Cell::List(s.split(separator.as_str()).map(|p| Cell::from(p.trim())).collect()),
                None => cell.clone(),
            },
            ValueOp::ToBoolean { true_values } => match cell {
                Cell::Bool(_) | Cell::Null => cell.clone(),
                _ => match scalar_text(cell) {
                    Some(s) => {
                        let lower = s.trim().to_lowercase();
                        Cell::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
                    }
                    None => Cell::Bool(false),
                },
            },
            ValueOp::ToInt => match cell {
                Cell::Int(_) => cell.clone(),
                Cell::Float(f) => Cell::Int(f.trunc() as i64),
                Cell::Bool(b) => Cell::Int(i64::from(*b)),
                Cell::Text(s) => s.trim().parse::<i64>().map(Cell::Int).unwrap_or(Cell::Null),
                _ => Cell::Null,
            },
            ValueOp::ToFloat => match cell {
                Cell::Int(i) => Cell::Float(*i as f64),
                Cell::Float(_) => cell.clone(),
                Cell::Text(s) => s.trim().parse::<f64>().map(Cell::Float).unwrap_or(Cell::Null),
                _ => Cell::Null,
            },
            ValueOp::ToText => match cell {
                Cell::Null => Cell::Null,
                other => Cell::Text(other.to_string()),
            },
            ValueOp::Substring { start, length } => map_text(cell, |s| {
                let chars: Vec<char> = s.chars().collect();
                let begin = (*start).min(chars.len());
                let end = length.map(|l| begin.saturating_add(l)).unwrap_or(chars.len()).min(chars.len());
                chars[begin..end].iter().collect()
            }),
            ValueOp::Alphanumeric => map_text(cell, |s| s.chars().filter(|c| c.is_alphanumeric()).collect()),
            ValueOp::DigitsOnly => map_text(cell, |s| s.chars().filter(|c| c.is_ascii_digit()).collect()),
        }
    }
}

/// Text of a scalar cell; numbers and bools are rendered.
fn scalar_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => Some(s.clone()),
        Cell::Int(_) | Cell::Float(_) | Cell::Bool(_) => Some(cell.to_string()),
        _ => None,
    }
}

fn map_text<F>(cell: &Cell, f: F) -> Cell
where
    F: FnOnce(&str) -> String,
{
    match scalar_text(cell) {
        Some(s) => Cell::Text(f(&s)),
        None => cell.clone(),
    }
}

fn pad(s: &str, length: usize, pad_char: &str, at_start: bool) -> String {
    let current = s.chars().count();
    if current >= length {
        return s.to_string();
    }
    let fill = pad_char.chars().next().unwrap_or(' ');
    let padding: String = std::iter::repeat(fill).take(length - current).collect();
    if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
}

fn apply_map(
    cell: &Cell,
    mapping: &HashMap<String, Cell>,
    case_insensitive: bool,
    default_unmapped: Option<&Cell>,
) -> Cell {
    let Some(key) = scalar_text(cell) else {
        return cell.clone();
    };

    let found = if case_insensitive {
        let lower = key.to_lowercase();
        mapping.iter().find(|(k, _)| k.to_lowercase() == lower).map(|(_, v)| v)
    } else {
        mapping.get(&key)
    };

    match (found, default_unmapped) {
        (Some(v), _) => v.clone(),
        (None, Some(d)) => d.clone(),
        (None, None) => cell.clone(),
    }
}
