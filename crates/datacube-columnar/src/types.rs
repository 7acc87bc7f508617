#![forbid(unsafe_code)]

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Logical column type supplied at construction time.
///
/// Every column is dictionary encoded; the type controls null normalization
/// (numeric columns keep nulls as-is) and is carried through as metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Nominal,
    Ordinal,
    Numeric,
    #[default]
    Unknown,
}

/// A raw input value or a decoded dictionary entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(OrderedFloat<f64>),
    String(Arc<str>),
}

impl Value {
    /// The canonical sentinel substituted for missing values in non-numeric columns.
    pub fn empty() -> Self {
        Value::String(Arc::from(""))
    }

    pub fn number(n: f64) -> Self {
        Value::Number(OrderedFloat(n))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value.
    ///
    /// Strings that parse as a float are accepted; everything else is `NaN`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Number(n) => n.into_inner(),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::Null => f64::NAN,
        }
    }
}

/// Dictionary order for columns whose first value is numeric.
///
/// Numbers ascend by value; strings follow in lexicographic order and nulls sort last.
pub(crate) fn cmp_numeric(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => cmp_lexicographic(a, b),
    }
}

/// Dictionary order for every other column: by string form, nulls last.
pub(crate) fn cmp_lexicographic(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(a), Value::String(b)) => a.as_ref().cmp(b.as_ref()),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{}", n.into_inner()),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One encoded row of a column.
///
/// A multi-valued row keeps its single row slot but points at several dictionary entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
    Single(u32),
    Multi(Box<[u32]>),
}

impl Cell {
    /// All dictionary codes referenced by the row.
    pub fn codes(&self) -> &[u32] {
        match self {
            Cell::Single(code) => std::slice::from_ref(code),
            Cell::Multi(codes) => codes,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Cell::Multi(_))
    }
}
