//! Request body normalization.
//!
//! # Design
//! The `body` call parameter is classified once into a `RequestBody` variant
//! and then encoded into an owned `String`. The encoded payload is moved into
//! the `HttpRequest`, so nothing downstream can alter it after this point.
//!
//! Arrays of objects use newline-delimited JSON framing (one document per
//! line plus a trailing newline), which is what bulk and multi-search
//! endpoints expect. Arrays of anything else are treated as pre-encoded lines
//! and are closed with an empty line.

use serde_json::{Map, Value};

use crate::error::ApiError;

pub const JSON: &str = "application/json";
pub const NDJSON: &str = "application/x-ndjson";

/// A classified request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as-is; the caller owns the encoding.
    Raw(String),
    /// One compact JSON document per line.
    Documents(Vec<Map<String, Value>>),
    /// Pre-encoded lines, terminated by a `null` sentinel.
    Lines(Vec<Value>),
    /// A single JSON document.
    Single(Value),
}

impl RequestBody {
    /// Classify a `body` parameter. `null` means no body.
    pub fn classify(value: Value) -> Option<RequestBody> {
        match value {
            Value::Null => None,
            Value::String(raw) => Some(RequestBody::Raw(raw)),
            Value::Array(items) if items.iter().all(Value::is_object) => Some(RequestBody::Documents(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
            )),
            Value::Array(mut items) => {
                if !matches!(items.last(), Some(Value::Null)) {
                    items.push(Value::Null);
                }
                Some(RequestBody::Lines(items))
            }
            other => Some(RequestBody::Single(other)),
        }
    }

    /// Encode into the wire payload.
    pub fn encode(&self) -> Result<String, ApiError> {
        match self {
            RequestBody::Raw(raw) => Ok(raw.clone()),
            RequestBody::Documents(docs) => {
                let mut out = docs
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ApiError::Serialization(e.to_string()))?
                    .join("\n");
                out.push('\n');
                Ok(out)
            }
            RequestBody::Lines(lines) => Ok(lines.iter().map(line_text).collect::<Vec<_>>().join("\n")),
            RequestBody::Single(value) => {
                serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
            }
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Documents(_) | RequestBody::Lines(_) => NDJSON,
            RequestBody::Raw(_) | RequestBody::Single(_) => JSON,
        }
    }
}

fn line_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Classify and encode in one step, returning the payload and its content type.
pub fn normalize(value: Value) -> Result<Option<(String, &'static str)>, ApiError> {
    match RequestBody::classify(value) {
        Some(body) => Ok(Some((body.encode()?, body.content_type()))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn encoded(value: Value) -> Option<String> {
        normalize(value).unwrap().map(|(payload, _)| payload)
    }

    #[test]
    fn null_means_no_body() {
        assert_eq!(encoded(Value::Null), None);
    }

    #[test]
    fn strings_pass_through_unchanged() {
        assert_eq!(encoded(json!("{\"raw\": 1}\n")).as_deref(), Some("{\"raw\": 1}\n"));
    }

    #[test]
    fn array_of_objects_is_line_framed_and_reparses() {
        let docs = json!([
            {"index": {"_index": "users", "_id": "1"}},
            {"name": "ada"},
            {"delete": {"_index": "users", "_id": "2"}}
        ]);
        let payload = encoded(docs.clone()).unwrap();

        assert!(payload.ends_with('\n'));
        let lines: Vec<&str> = payload.trim_end_matches('\n').split('\n').collect();
        assert_eq!(lines.len(), 3);
        let reparsed: Vec<Value> = lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(Value::Array(reparsed), docs);
    }

    #[test]
    fn array_of_strings_gets_blank_line_sentinel() {
        assert_eq!(encoded(json!(["a", "b"])).as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn existing_null_terminator_is_not_doubled() {
        assert_eq!(encoded(json!(["a", "b", null])).as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn mixed_array_is_treated_as_lines() {
        let payload = encoded(json!([{"index": {}}, "raw line", 3])).unwrap();
        assert_eq!(payload, "{\"index\":{}}\nraw line\n3\n");
    }

    #[test]
    fn empty_array_counts_as_documents() {
        assert_eq!(encoded(json!([])).as_deref(), Some("\n"));
    }

    #[test]
    fn objects_become_a_single_document() {
        let payload = encoded(json!({"query": {"match_all": {}}})).unwrap();
        assert_eq!(payload, r#"{"query":{"match_all":{}}}"#);
        assert!(!payload.contains('\n'));
    }

    #[test]
    fn content_types_follow_the_variant() {
        assert_eq!(RequestBody::classify(json!([{}])).unwrap().content_type(), NDJSON);
        assert_eq!(RequestBody::classify(json!(["x"])).unwrap().content_type(), NDJSON);
        assert_eq!(RequestBody::classify(json!({})).unwrap().content_type(), JSON);
        assert_eq!(RequestBody::classify(json!(1)).unwrap().content_type(), JSON);
    }
}
