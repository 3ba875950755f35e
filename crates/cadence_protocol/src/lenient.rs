//! Decoders for the scheduler's loose JSON encodings.
//!
//! Flags arrive as `0/1`, `true/false` or occasionally numeric strings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_flag(&value))
}

pub(crate) fn value_as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        _ => false,
    }
}

pub(crate) fn optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Non-negative whole number, also accepted as a numeric string.
///
/// Fractions are truncated. Host runners pass every plugin parameter as text.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_count(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("expected a non-negative number, got {}", value))
    })
}

pub fn value_as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Value::String(s) = value {
        if let Ok(n) = s.trim().parse::<u64>() {
            return Some(n);
        }
    }
    value_as_f64(value)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.trunc() as u64)
}

/// Empty strings are how the scheduler spells "no value".
pub(crate) fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}
