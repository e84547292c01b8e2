//! Dot-path addressing inside stored values
//!
//! A key such as `user.profile.name` names the row `user` and the nested
//! field `profile.name` inside its value. Resolution is purely structural:
//! objects are walked by field name, arrays by numeric index.

use serde_json::{Map, Value};

use crate::error::{KvError, Result};

/// Separator between the root key and nested segments
pub const SEPARATOR: char = '.';

/// A key split into the stored row id and the nested field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath<'a> {
    pub root: &'a str,
    pub segments: Vec<&'a str>,
}

impl<'a> KeyPath<'a> {
    /// Split `key` on the separator unless `normal_keys` disables paths.
    pub fn parse(key: &'a str, normal_keys: bool) -> Self {
        if normal_keys || !key.contains(SEPARATOR) {
            return Self {
                root: key,
                segments: Vec::new(),
            };
        }

        let mut parts = key.split(SEPARATOR);
        let root = parts.next().unwrap_or(key);
        Self {
            root,
            segments: parts.collect(),
        }
    }

    pub fn is_nested(&self) -> bool {
        !self.segments.is_empty()
    }
}

/// True for values that can hold nested fields.
pub fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Resolve `segments` below `value`; a missing segment yields `None`.
pub fn get_path<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn get_path_mut<'v>(value: &'v mut Value, segments: &[&str]) -> Option<&'v mut Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get_mut(*segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Largest run of `null` padding a single array write may add
pub const MAX_ARRAY_GAP: usize = 1024;

/// Write `new_value` at `segments` below `target`.
///
/// Missing or scalar intermediates become empty objects. Existing arrays
/// only accept numeric segments and are padded with `null` up to the
/// index, at most [`MAX_ARRAY_GAP`] slots past the end.
pub fn set_path(target: &mut Value, segments: &[&str], new_value: Value) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *target = new_value;
        return Ok(());
    };

    if let Value::Array(items) = target {
        let index = array_index(head, items.len())?;
        if index >= items.len() {
            items.resize(index + 1, Value::Null);
        }
        return set_path(&mut items[index], rest, new_value);
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    match target {
        Value::Object(map) => {
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            set_path(slot, rest, new_value)
        }
        _ => Ok(()),
    }
}

fn array_index(segment: &str, len: usize) -> Result<usize> {
    let index = segment.parse::<usize>().map_err(|_| {
        KvError::InvalidType(format!(
            "path segment \"{}\" addresses an array and must be an index",
            segment
        ))
    })?;
    if index > len.saturating_add(MAX_ARRAY_GAP) {
        return Err(KvError::InvalidType(format!(
            "array index {} is more than {} past the end (length {})",
            index, MAX_ARRAY_GAP, len
        )));
    }
    Ok(index)
}

/// Remove the leaf at `segments`. Returns whether anything was removed.
pub fn unset_path(target: &mut Value, segments: &[&str]) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };
    let Some(parent) = get_path_mut(target, parents) else {
        return false;
    };

    match parent {
        Value::Object(map) => map.shift_remove(*last).is_some(),
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Numeric reading of a stored value or argument.
///
/// Numbers are taken as-is and strings are parsed after trimming.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

// 2^53, the largest range where f64 holds every integer exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Render an arithmetic result, keeping integral values as JSON integers.
pub fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Some(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_and_nested() {
        let plain = KeyPath::parse("user", false);
        assert_eq!(plain.root, "user");
        assert!(!plain.is_nested());

        let nested = KeyPath::parse("user.profile.name", false);
        assert_eq!(nested.root, "user");
        assert_eq!(nested.segments, vec!["profile", "name"]);

        let normal = KeyPath::parse("user.profile", true);
        assert_eq!(normal.root, "user.profile");
        assert!(!normal.is_nested());
    }

    #[test]
    fn test_get_path_walks_objects_and_arrays() {
        let value = json!({"a": {"b": [10, {"c": "deep"}]}});
        assert_eq!(get_path(&value, &["a", "b", "0"]), Some(&json!(10)));
        assert_eq!(get_path(&value, &["a", "b", "1", "c"]), Some(&json!("deep")));
        assert_eq!(get_path(&value, &["a", "missing", "c"]), None);
        assert_eq!(get_path(&value, &["a", "b", "x"]), None);
        assert_eq!(get_path(&value, &[]), Some(&value));
    }

    #[test]
    fn test_set_path_creates_objects() {
        let mut value = Value::Null;
        set_path(&mut value, &["a", "b", "c"], json!(1)).unwrap();
        assert_eq!(value, json!({"a": {"b": {"c": 1}}}));

        set_path(&mut value, &["a", "d"], json!("x")).unwrap();
        assert_eq!(value, json!({"a": {"b": {"c": 1}, "d": "x"}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut value = json!({"a": 5});
        set_path(&mut value, &["a", "b"], json!(true)).unwrap();
        assert_eq!(value, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_path_indexes_existing_array() {
        let mut value = json!({"list": [1, 2]});
        set_path(&mut value, &["list", "1"], json!(20)).unwrap();
        set_path(&mut value, &["list", "3"], json!(40)).unwrap();
        assert_eq!(value, json!({"list": [1, 20, null, 40]}));
    }

    #[test]
    fn test_set_path_rejects_distant_index() {
        let mut value = json!({"list": [1, 2]});
        let err = set_path(&mut value, &["list", "18446744073709551615"], json!(1)).unwrap_err();
        assert!(matches!(err, KvError::InvalidType(_)));
        assert!(set_path(&mut value, &["list", "4000000000"], json!(1)).is_err());
        assert_eq!(value, json!({"list": [1, 2]}));

        set_path(&mut value, &["list", "1026"], json!(3)).unwrap();
        assert_eq!(value["list"].as_array().unwrap().len(), 1027);
        assert!(set_path(&mut value, &["list", "2051"], json!(4)).is_ok());
        assert!(set_path(&mut value, &["list", "3077"], json!(5)).is_err());
    }

    #[test]
    fn test_set_path_keeps_array_on_named_segment() {
        let mut value = json!({"list": [1, 2]});
        let err = set_path(&mut value, &["list", "name"], json!("x")).unwrap_err();
        assert!(matches!(err, KvError::InvalidType(_)));
        assert_eq!(value, json!({"list": [1, 2]}));

        let mut root = json!([1, 2]);
        assert!(set_path(&mut root, &["name"], json!("x")).is_err());
        assert_eq!(root, json!([1, 2]));
    }

    #[test]
    fn test_unset_path_removes_leaf_only() {
        let mut value = json!({"a": {"b": {"c": 1, "keep": 2}, "sibling": 3}});
        assert!(unset_path(&mut value, &["a", "b", "c"]));
        assert_eq!(value, json!({"a": {"b": {"keep": 2}, "sibling": 3}}));

        assert!(!unset_path(&mut value, &["a", "nope", "c"]));
        assert!(!unset_path(&mut value, &[]));
    }

    #[test]
    fn test_unset_path_array_element() {
        let mut value = json!({"list": ["x", "y", "z"]});
        assert!(unset_path(&mut value, &["list", "1"]));
        assert_eq!(value, json!({"list": ["x", "z"]}));
        assert!(!unset_path(&mut value, &["list", "9"]));
    }

    #[test]
    fn test_unset_preserves_field_order() {
        let mut value = json!({"first": 1, "second": 2, "third": 3});
        unset_path(&mut value, &["first"]);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["second", "third"]);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(true)), None);
        assert_eq!(to_number(&json!([1])), None);
    }

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(5.0), Some(json!(5)));
        assert_eq!(number_value(-3.0), Some(json!(-3)));
        assert_eq!(number_value(1.5), Some(json!(1.5)));
        assert_eq!(number_value(f64::NAN), None);
    }
}
