//! Element matchers for `pull`

use qkv_core::{KvError, Result};
use serde_json::Value;
use std::fmt;

type Predicate = Box<dyn Fn(&Value, usize) -> bool + Send + Sync>;

/// Selects array elements to remove
pub enum Matcher {
    /// Elements equal to this value
    Value(Value),
    /// Elements equal to any of these values
    AnyOf(Vec<Value>),
    /// Elements for which `f(element, index)` holds
    Predicate(Predicate),
}

impl Matcher {
    pub fn predicate(f: impl Fn(&Value, usize) -> bool + Send + Sync + 'static) -> Self {
        Matcher::Predicate(Box::new(f))
    }

    pub fn any_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Matcher::AnyOf(values.into_iter().map(Into::into).collect())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Matcher::Value(Value::Null) => Err(KvError::MissingValue(
                "second argument (value) is required".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, element: &Value, index: usize) -> bool {
        match self {
            Matcher::Value(value) => same_value(value, element),
            Matcher::AnyOf(values) => values.iter().any(|value| same_value(value, element)),
            Matcher::Predicate(f) => f(element, index),
        }
    }
}

/// Structural equality, with numbers compared by value so `2` matches `2.0`
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Arrays become a set of literals, anything else a single literal
impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => Matcher::AnyOf(values),
            other => Matcher::Value(other),
        }
    }
}

impl From<Vec<Value>> for Matcher {
    fn from(values: Vec<Value>) -> Self {
        Matcher::AnyOf(values)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Matcher::AnyOf(values) => f.debug_tuple("AnyOf").field(values).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
