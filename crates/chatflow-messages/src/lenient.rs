//! Lenient field decoding for persisted rows, whose numeric columns arrive as
//! numbers, numeric strings or null depending on the store.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::history::MessageKey;

/// Number or numeric string as `f64`. Anything else is `None`.
pub fn number_of(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Strings verbatim; other non-null values as compact JSON. Empty is `None`.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Row identifier from whatever the store sent. Integer-valued numbers
/// become `Number`, integers past `i64` and other numbers become `Text`, and
/// strings are kept. Null and structured values are `None`.
pub fn key_of(value: &Value) -> Option<MessageKey> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(MessageKey::Number(i));
            }
            if let Some(u) = n.as_u64() {
                return Some(MessageKey::Text(u.to_string()));
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(MessageKey::Number(f as i64))
            } else {
                Some(MessageKey::Text(n.to_string()))
            }
        }
        Value::String(s) => Some(MessageKey::Text(s.clone())),
        _ => None,
    }
}

pub(crate) fn opt_key<'de, D>(deserializer: D) -> Result<Option<MessageKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(key_of))
}

/// Strings only; any other value is `None`.
pub(crate) fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

pub(crate) fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_of)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc() as u64))
}

pub(crate) fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_of))
}

pub(crate) fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(other) => text_of(&other),
        None => None,
    })
}

/// Arrays as-is; anything else (null, object, string) as an empty list.
pub(crate) fn value_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_of_accepts_numbers_and_numeric_strings() {
        assert_eq!(number_of(&json!(150)), Some(150.0));
        assert_eq!(number_of(&json!(" 0.5 ")), Some(0.5));
        assert_eq!(number_of(&json!("many")), None);
        assert_eq!(number_of(&json!(null)), None);
        assert_eq!(number_of(&json!(true)), None);
    }

    #[test]
    fn key_of_accepts_numbers_and_strings() {
        assert_eq!(key_of(&json!(7)), Some(MessageKey::Number(7)));
        assert_eq!(key_of(&json!(1.0)), Some(MessageKey::Number(1)));
        assert_eq!(key_of(&json!(1.5)), Some(MessageKey::Text("1.5".into())));
        assert_eq!(
            key_of(&json!(u64::MAX)),
            Some(MessageKey::Text(u64::MAX.to_string()))
        );
        assert_eq!(key_of(&json!("m-1")), Some(MessageKey::Text("m-1".into())));
        assert_eq!(key_of(&json!(null)), None);
        assert_eq!(key_of(&json!([1])), None);
    }

    #[test]
    fn text_of_renders_non_strings_as_json() {
        assert_eq!(text_of(&json!("x")), Some("x".to_string()));
        assert_eq!(text_of(&json!({"a":1})), Some("{\"a\":1}".to_string()));
        assert_eq!(text_of(&json!("")), None);
        assert_eq!(text_of(&json!(null)), None);
    }
}
