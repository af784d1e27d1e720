//! Record normalization applied before decoding.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// A record that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the record in the upstream listing.
    pub index: usize,
    /// Upstream identifier when one could be read.
    pub key: Option<String>,
    pub error: String,
}

/// Decoded records plus the ones that were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<T> {
    pub records: Vec<T>,
    pub rejections: Vec<Rejection>,
}

impl<T> Default for FetchResult<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejections: Vec::new(),
        }
    }
}

impl<T> FetchResult<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            rejections: Vec::new(),
        }
    }
}

/// Trims every string and turns empty strings into `null`, recursively.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if trimmed.len() == s.len() {
                Value::String(s)
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Normalizes and decodes each raw record; failures become rejections.
///
/// `key_field` names the field reported with a rejection.
pub fn decode_records<T: DeserializeOwned>(raw: Vec<Value>, key_field: &str) -> FetchResult<T> {
    let mut result = FetchResult::default();
    for (index, value) in raw.into_iter().enumerate() {
        let value = normalize_value(value);
        let key = value
            .get(key_field)
            .map(|k| k.as_str().map(str::to_string).unwrap_or_else(|| k.to_string()));
        match serde_json::from_value::<T>(value) {
            Ok(record) => result.records.push(record),
            Err(e) => {
                warn!(index, key = ?key, error = %e, "Rejected upstream record");
                result.rejections.push(Rejection {
                    index,
                    key,
                    error: e.to_string(),
                });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        name: Option<String>,
    }

    #[test]
    fn test_normalize_trims_and_nulls_empty() {
        let value = normalize_value(json!({
            "id": "  MITx  ",
            "name": "   ",
            "nested": {"tags": [" a ", ""]},
            "count": 3
        }));
        assert_eq!(
            value,
            json!({"id": "MITx", "name": null, "nested": {"tags": ["a", null]}, "count": 3})
        );
    }

    #[test]
    fn test_decode_records_collects_rejections() {
        let raw = vec![
            json!({"id": "a", "name": " Alpha "}),
            json!({"id": 7}),
            json!({"id": "c", "name": ""}),
        ];
        let result: FetchResult<Record> = decode_records(raw, "id");

        assert_eq!(
            result.records,
            vec![
                Record {
                    id: "a".into(),
                    name: Some("Alpha".into())
                },
                Record {
                    id: "c".into(),
                    name: None
                },
            ]
        );
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].index, 1);
        assert_eq!(result.rejections[0].key.as_deref(), Some("7"));
    }
}
