use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::NativeKey;
use crate::property::PropertyBag;

/// A single property value as the store holds it.
///
/// The store is schemaless: any property of any record may hold any variant.
/// Queries still need a deterministic order across variants, which
/// [`Value::total_cmp`] provides by ranking types first and comparing
/// within a type second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Key(NativeKey),
    Array(Vec<Value>),
    /// Embedded (compound) entity without a key of its own.
    Entity(PropertyBag),
}

impl Value {
    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Key(_) => "key",
            Value::Array(_) => "array",
            Value::Entity(_) => "entity",
        }
    }

    // Integers and doubles share a rank so they compare numerically.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Double(_) => 1,
            Value::Boolean(_) => 2,
            Value::String(_) => 3,
            Value::Blob(_) => 4,
            Value::Key(_) => 5,
            Value::Array(_) => 6,
            Value::Entity(_) => 7,
        }
    }

    /// Total order over all values.
    ///
    /// Ranks: null < numbers < booleans < strings < blobs < keys < arrays <
    /// entities. An integer and a double that are numerically equal order
    /// the integer first, so `Integer(1)` and `Double(1.0)` are distinct.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        let by_rank = self.type_rank().cmp(&other.type_rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Double(b)) => {
                cmp_integer_double(*a, *b).then(Ordering::Less)
            }
            (Value::Double(a), Value::Integer(b)) => {
                cmp_integer_double(*b, *a).reverse().then(Ordering::Greater)
            }
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::Key(a), Value::Key(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Entity(a), Value::Entity(b)) => a.total_cmp(b),
            _ => Ordering::Equal,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Blob(bytes.into())
    }
}

/// Exact numeric comparison of an integer with a double.
///
/// NaNs sit where `f64::total_cmp` puts them: negative NaN below every
/// number, positive NaN above.
fn cmp_integer_double(a: i64, b: f64) -> Ordering {
    // 2^63, the first double past i64::MAX.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= BOUND {
        return Ordering::Less;
    }
    if b < -BOUND {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(b - whole)).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Key(key) => write!(f, "{key}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Entity(bag) => write!(f, "{{{} properties}}", bag.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NativeKey> for Value {
    fn from(key: NativeKey) -> Self {
        Value::Key(key)
    }
}

impl From<PropertyBag> for Value {
    fn from(bag: PropertyBag) -> Self {
        Value::Entity(bag)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
