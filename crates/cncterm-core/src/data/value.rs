//! Loosely typed values exchanged with a backend.

use serde_json::Value;

/// Field name to value map used for request parameters and response data.
pub type ValueMap = serde_json::Map<String, Value>;

/// Read a number, accepting numeric strings.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Default textual form of a value.
///
/// Strings are written without quotes, null as an empty string, numbers
/// as written, and composite values as compact JSON.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Case-insensitive field lookup.
///
/// An exact match wins over a case-folded one.
pub fn get_ignore_case<'a>(map: &'a ValueMap, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}
