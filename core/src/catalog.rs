//! Versioned API catalogs.
//!
//! # Design
//! A `Catalog` maps operation names (`"index"`, `"indices.exists"`, ...) to
//! the `ApiSpec` describing how to call them. Catalogs are plain JSON data and
//! are registered in a `CatalogRegistry` under a `major.minor` key. The client
//! picks one catalog at construction from the detected server version and
//! keeps it for its whole lifetime.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Declarative description of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub methods: Vec<String>,
    pub url: UrlSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSpec {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySpec {
    #[serde(default)]
    pub required: bool,
}

impl ApiSpec {
    pub fn new<M, P>(methods: M, paths: P) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
            url: UrlSpec {
                paths: paths.into_iter().map(Into::into).collect(),
            },
            body: None,
        }
    }

    /// Mark the body as required.
    pub fn with_required_body(mut self) -> Self {
        self.body = Some(BodySpec { required: true });
        self
    }

    pub fn body_required(&self) -> bool {
        self.body.as_ref().is_some_and(|b| b.required)
    }
}

/// Operation name to spec mapping for one server version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    specs: BTreeMap<String, ApiSpec>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        serde_json::from_str(json).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: ApiSpec) {
        self.specs.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ApiSpec> {
        self.specs.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Reduce a server version string to its `major.minor` key.
///
/// `"7.10.2"` and `"7.10.0-SNAPSHOT"` both map to `"7.10"`.
pub fn version_key(version: &str) -> Option<String> {
    let mut parts = version.trim().split('.');
    let major = parts.next().filter(|p| !p.is_empty())?;
    let minor = parts.next().filter(|p| !p.is_empty())?;
    Some(format!("{major}.{minor}"))
}

/// Catalogs keyed by `major.minor` version.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    catalogs: HashMap<String, Arc<Catalog>>,
}

const CATALOG_6_8: &str = include_str!("../catalogs/6.8.json");
const CATALOG_7_10: &str = include_str!("../catalogs/7.10.json");

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the catalogs shipped with this crate.
    pub fn bundled() -> Result<Self, ApiError> {
        let mut registry = Self::new();
        registry.register("6.8", Catalog::from_json(CATALOG_6_8)?);
        registry.register("7.10", Catalog::from_json(CATALOG_7_10)?);
        Ok(registry)
    }

    pub fn register(&mut self, key: impl Into<String>, catalog: Catalog) -> &mut Self {
        self.catalogs.insert(key.into(), Arc::new(catalog));
        self
    }

    /// Look up the catalog for a full server version string.
    pub fn for_version(&self, version: &str) -> Result<Arc<Catalog>, ApiError> {
        version_key(version)
            .and_then(|key| self.catalogs.get(&key).cloned())
            .ok_or_else(|| ApiError::UnsupportedVersion(version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_key_keeps_major_and_minor() {
        assert_eq!(version_key("7.10.2").as_deref(), Some("7.10"));
        assert_eq!(version_key("6.8.0-SNAPSHOT").as_deref(), Some("6.8"));
        assert_eq!(version_key("8.1").as_deref(), Some("8.1"));
        assert_eq!(version_key("8"), None);
        assert_eq!(version_key(""), None);
    }

    #[test]
    fn spec_deserializes_with_optional_body() {
        let spec: ApiSpec = serde_json::from_str(
            r#"{"methods": ["PUT", "POST"], "url": {"paths": ["/{index}/_doc/{id}"]}, "body": {"required": true}}"#,
        )
        .unwrap();
        assert!(spec.body_required());
        assert_eq!(spec.methods, vec!["PUT", "POST"]);

        let spec: ApiSpec = serde_json::from_str(r#"{"methods": ["GET"], "url": {"paths": ["/"]}}"#).unwrap();
        assert!(!spec.body_required());
    }

    #[test]
    fn bundled_registry_resolves_known_versions() {
        let registry = CatalogRegistry::bundled().unwrap();
        let catalog = registry.for_version("7.10.2").unwrap();
        assert!(catalog.get("index").is_some());
        assert!(catalog.get("indices.exists").is_some());
        assert!(catalog.get("bulk").unwrap().body_required());

        let legacy = registry.for_version("6.8.23").unwrap();
        assert!(legacy.get("get").unwrap().url.paths.iter().any(|p| p.contains("{type}")));
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let registry = CatalogRegistry::bundled().unwrap();
        let err = registry.for_version("1.7.5").unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedVersion(v) if v == "1.7.5"));
    }

    #[test]
    fn custom_catalogs_can_be_registered() {
        let mut catalog = Catalog::default();
        catalog.insert("ping", ApiSpec::new(["HEAD"], ["/"]));
        let mut registry = CatalogRegistry::new();
        registry.register("9.0", catalog);

        let loaded = registry.for_version("9.0.1").unwrap();
        assert_eq!(loaded.operations().collect::<Vec<_>>(), vec!["ping"]);
    }
}
