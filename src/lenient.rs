//! Forgiving field decoders.
//!
//! The JSON documents are edited by hand and request bodies come from
//! browsers, so a number may arrive as `"3"` or `3.0` and a name as `42`.
//! These decoders coerce what they sensibly can instead of rejecting the
//! whole record.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn integer_from(value: &Value) -> Option<i64> {
    match value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Integer, float (truncated), numeric string or `null` (zero).
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    integer_from(&value).ok_or_else(|| D::Error::custom(format!("expected a number, got {}", value)))
}

/// Like [`integer`], clamped at zero.
pub fn counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    integer(deserializer).map(|n| n.max(0) as u64)
}

/// Strings pass through, numbers and booleans are rendered, anything else
/// becomes empty.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// The string elements of an array. Non-arrays decode as empty.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "integer")]
        at: i64,
        #[serde(default, deserialize_with = "counter")]
        count: u64,
        #[serde(default, deserialize_with = "text")]
        name: String,
        #[serde(default, deserialize_with = "text_list")]
        tags: Vec<String>,
    }

    fn sample(value: Value) -> Result<Sample, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_numbers_are_coerced() {
        let s = sample(json!({"at": 1767225600.7, "count": "3"})).unwrap();
        assert_eq!(s.at, 1_767_225_600);
        assert_eq!(s.count, 3);

        let s = sample(json!({"at": " 42 ", "count": -5})).unwrap();
        assert_eq!(s.at, 42);
        assert_eq!(s.count, 0);

        let s = sample(json!({"at": null})).unwrap();
        assert_eq!(s.at, 0);
    }

    #[test]
    fn test_non_numeric_is_an_error() {
        assert!(sample(json!({"count": "lots"})).is_err());
        assert!(sample(json!({"at": [1]})).is_err());
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(sample(json!({"name": 42})).unwrap().name, "42");
        assert_eq!(sample(json!({"name": {"a": 1}})).unwrap().name, "");
        assert_eq!(sample(json!({})).unwrap().name, "");
    }

    #[test]
    fn test_text_list_keeps_only_strings() {
        assert_eq!(sample(json!({"tags": ["pvp", 3, null, "rpg"]})).unwrap().tags, vec!["pvp", "rpg"]);
        assert!(sample(json!({"tags": "pvp"})).unwrap().tags.is_empty());
    }
}
