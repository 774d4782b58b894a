//! Normalization of array-ish text columns.
//!
//! Product columns such as `price`, `category`, `images`, `weight` and
//! `size` are text arrays in the database, but they reach us in several
//! shapes depending on the endpoint: a JSON array from table reads, a
//! Postgres array literal (`{a,"b c"}`) from some RPCs, a bare
//! comma-separated string from older rows, or `null`. Everything is folded
//! into a `Vec<String>` of trimmed, unquoted, non-empty items.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Split an array-ish text value into its items.
///
/// ```
/// use lese_core::parse_list;
///
/// assert_eq!(parse_list("{Çelik,\"Alüminyum\"}"), vec!["Çelik", "Alüminyum"]);
/// assert_eq!(parse_list(" 2mm, 3mm "), vec!["2mm", "3mm"]);
/// assert!(parse_list("{}").is_empty());
/// ```
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);

    inner
        .split(',')
        .map(|item| item.trim().replace('"', ""))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Split a comma-separated admin form field into items.
///
/// Unlike [`parse_list`] this keeps quotes, since an admin typing
/// `12" panel` means the inch mark.
#[must_use]
pub fn split_csv_field(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn list_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => parse_list(&s),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        other => vec![other.to_string()],
    }
}

/// Serde helper for array-ish columns.
///
/// Use with `#[serde(default, deserialize_with = "lese_core::deserialize_list")]`.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(list_from_value)
}

/// Serde helper for free-text columns that are sometimes stored as arrays.
///
/// Arrays are joined with a single space; `null` becomes an empty string.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    })
}
