//! Dynamically-typed cell values.
//!
//! # Ordering
//!
//! Cells of different kinds are totally ordered by kind first:
//!
//! ```text
//! Null < Bool < number (Int | Float) < Text < List < Map
//! ```
//!
//! `Int` and `Float` share one numeric kind and compare by value, so
//! `Int(1) == Float(1.0)` and both hash alike. Floats use `total_cmp` with
//! `-0.0` folded onto `0.0` and every NaN folded onto one canonical NaN
//! (which sorts above every other number). Lists compare element-wise,
//! maps by their sorted `(key, value)` entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single table value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Nested arrays pass through operations untouched
    List(Vec<Cell>),
    /// Nested objects, e.g. REST payloads before field mapping flattens them
    Map(BTreeMap<String, Cell>),
}

/// Shared `Null` used when reading past the end of a short row.
pub static NULL: Cell = Cell::Null;

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) => integral(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Runtime type name as used by the `type` validation rule.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "string",
            Cell::List(_) => "array",
            Cell::Map(_) => "object",
        }
    }

    /// Numeric addition. `None` when either side is not a number.
    ///
    /// Integer sums stay integral until they overflow, then widen to float.
    pub fn checked_add(&self, other: &Cell) -> Option<Cell> {
        match (self, other) {
            (Cell::Int(a), Cell::Int(b)) => Some(
                a.checked_add(*b)
                    .map(Cell::Int)
                    .unwrap_or(Cell::Float(*a as f64 + *b as f64)),
            ),
            _ => Some(Cell::Float(self.as_f64()? + other.as_f64()?)),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Bool(_) => 1,
            Cell::Int(_) | Cell::Float(_) => 2,
            Cell::Text(_) => 3,
            Cell::List(_) => 4,
            Cell::Map(_) => 5,
        }
    }
}

/// `Some(i)` when `f` is a whole number representable as `i64`.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn canonical_float(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

fn cmp_numbers(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => x.cmp(y),
        (Cell::Float(x), Cell::Float(y)) => canonical_float(*x).total_cmp(&canonical_float(*y)),
        (Cell::Int(x), Cell::Float(y)) => cmp_int_float(*x, *y),
        (Cell::Float(x), Cell::Int(y)) => cmp_int_float(*y, *x).reverse(),
        _ => Ordering::Equal,
    }
}

/// Exact comparison; `i` is never rounded through `f64`.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    // 2^63, the first float above every i64
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let floor = f.floor();
    match i.cmp(&(floor as i64)) {
        // i == floor(f) < f
        Ordering::Equal if floor != f => Ordering::Less,
        other => other,
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.kind_rank().cmp(&other.kind_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (Cell::Null, Cell::Null) => Ordering::Equal,
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::List(a), Cell::List(b)) => a.cmp(b),
            (Cell::Map(a), Cell::Map(b)) => a.iter().cmp(b.iter()),
            _ => cmp_numbers(self, other),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Cell::Null => {}
            Cell::Bool(b) => b.hash(state),
            Cell::Int(i) => i.hash(state),
            // Whole floats hash as the matching integer so Int(1) and Float(1.0) collide
            Cell::Float(f) => match integral(*f) {
                Some(i) => i.hash(state),
                None => canonical_float(*f).to_bits().hash(state),
            },
            Cell::Text(s) => s.hash(state),
            Cell::List(items) => items.hash(state),
            Cell::Map(map) => {
                map.len().hash(state);
                for (k, v) in map {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Cell::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v.into())
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        i64::try_from(v)
            .map(Cell::Int)
            .unwrap_or(Cell::Float(v as f64))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<Vec<Cell>> for Cell {
    fn from(v: Vec<Cell>) -> Self {
        Cell::List(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s),
            Value::Array(items) => Cell::List(items.into_iter().map(Cell::from).collect()),
            Value::Object(obj) => Cell::Map(obj.into_iter().map(|(k, v)| (k, Cell::from(v))).collect()),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(b),
            Cell::Int(i) => Value::Number(i.into()),
            // Non-finite floats have no JSON form
            Cell::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s),
            Cell::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Cell::Map(map) => {
                let obj: JsonMap<String, Value> = map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::Object(obj)
            }
        }
    }
}
