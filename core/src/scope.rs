//! Named identifiers used to fill path template placeholders.
//!
//! # Design
//! A `Scope` is layered: the client holds a default scope fixed at
//! construction, and each call may carry its own scope extracted from the
//! call parameters. The call layer wins for the duration of that call only.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::Params;

/// Parameter keys that are lifted out of call parameters into the call scope.
pub const SCOPE_KEYS: [&str; 3] = ["index", "type", "id"];

/// Ordered mapping of placeholder name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    values: BTreeMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A new scope with `overrides` layered on top of `self`.
    pub fn merged(&self, overrides: &Scope) -> Scope {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Scope { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Scope {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value:?}")?;
        }
        f.write_str("}")
    }
}

/// Remove the scope-bearing keys from `params` and return them as a `Scope`.
///
/// `null` and `false` are removed but do not contribute a value.
pub fn extract_scopes(params: &mut Params) -> Scope {
    let mut scope = Scope::new();
    for key in SCOPE_KEYS {
        let Some(value) = params.remove(key) else {
            continue;
        };
        let text = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        scope.values.insert(key.to_string(), text);
    }
    scope
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn extracts_only_known_scope_keys() {
        let mut p = params(json!({"index": "users", "id": 7, "refresh": "true", "body": {}}));
        let scope = extract_scopes(&mut p);

        assert_eq!(scope.get("index"), Some("users"));
        assert_eq!(scope.get("id"), Some("7"));
        assert_eq!(scope.get("type"), None);
        assert!(p.contains_key("refresh"));
        assert!(p.contains_key("body"));
        assert!(!p.contains_key("index"));
        assert!(!p.contains_key("id"));
    }

    #[test]
    fn null_scope_values_are_dropped() {
        let mut p = params(json!({"index": null, "type": false}));
        let scope = extract_scopes(&mut p);
        assert!(scope.is_empty());
        assert!(p.is_empty());
    }

    #[test]
    fn merged_prefers_overrides_and_leaves_base_untouched() {
        let base = Scope::new().with("index", "users").with("type", "_doc");
        let call = Scope::new().with("index", "orders").with("id", "42");
        let merged = base.merged(&call);

        assert_eq!(merged.get("index"), Some("orders"));
        assert_eq!(merged.get("type"), Some("_doc"));
        assert_eq!(merged.get("id"), Some("42"));
        assert_eq!(base.get("index"), Some("users"));
        assert_eq!(base.get("id"), None);
    }

    #[test]
    fn display_lists_entries_in_key_order() {
        let scope: Scope = [("id", "1"), ("index", "users")].into_iter().collect();
        assert_eq!(scope.to_string(), r#"{id: "1", index: "users"}"#);
    }
}
