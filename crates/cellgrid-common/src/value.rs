//! The evaluation result value.

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use crate::CellError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scalar or 2-D evaluation result.
///
/// `Empty` stands in for an unset cell or a missing result; `Array`
/// is always dense and row-major. Errors are ordinary values here,
/// never `Err`; see [`crate::CellError`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<Value>>),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Empty => state.write_u8(0),
            Value::Number(n) => n.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Error(e) => e.hash(state),
            Value::Array(a) => a.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, ""),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Error(e) => write!(f, "{e}"),
            Value::Array(a) => write!(f, "{a:?}"),
        }
    }
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Rows/cols of an array, (1, 1) for scalars.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Value::Array(rows) => (rows.len(), rows.first().map(|r| r.len()).unwrap_or(0)),
            _ => (1, 1),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Error(_) | Value::Empty => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}
