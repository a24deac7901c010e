//! Spreadsheet cells round-trip through `serde_json::Value` as whatever the
//! backend handed back — a store that returns "user-entered" values may
//! render a number as a JSON number or as a numeric string depending on
//! column formatting. These helpers accept either.

use serde_json::Value;

pub fn as_str(v: &Value) -> Option<&str> {
    v.as_str()
}

pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn non_empty_str(v: &Value) -> Option<String> {
    as_str(v).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
