//! Versioned client for a search cluster's REST API.
//!
//! # Design
//! A `Client` owns its configuration, a default `Scope`, the server version
//! and the `Catalog` selected for that version. The transport is built once,
//! eagerly, by the configured `Connector`; every call after that is a single
//! `Dispatcher::dispatch`. When no version is configured, construction issues
//! one `GET /` and reads `version.number` from the reply.
//!
//! Operations are invoked by name through `Client::call`. Calls that need an
//! operation the catalog does not know can pass an `ApiSpec` directly to
//! `Client::request`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, debug_span};

use crate::catalog::{ApiSpec, Catalog, CatalogRegistry};
use crate::config::ClientConfig;
use crate::dispatch::{self, Dispatcher};
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::scope::Scope;
use crate::transport::{Connector, Transport, UreqConnector};
use crate::Params;

/// Client bound to one cluster, one server version and one default scope.
pub struct Client {
    config: ClientConfig,
    scope: Scope,
    version: String,
    catalog: Arc<Catalog>,
    connector: Arc<dyn Connector>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.config.url)
            .field("version", &self.version)
            .field("scope", &self.scope)
            .field("operations", &self.catalog.len())
            .finish()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client for `url` with default settings, detecting the server version.
    pub fn new(url: &str) -> Result<Self, ApiError> {
        Self::builder().url(url).build()
    }

    /// Invoke a catalog operation by name.
    pub fn call(&self, operation: &str, params: Params) -> Result<Value, ApiError> {
        let spec = self.spec(operation)?;
        let _span = debug_span!("quarry.call", operation).entered();
        self.request(spec, params)
    }

    /// Dispatch an ad-hoc spec against this client's scope and transport.
    pub fn request(&self, spec: &ApiSpec, params: Params) -> Result<Value, ApiError> {
        Dispatcher::new(self.transport.as_ref(), &self.scope).dispatch(spec, params)
    }

    /// Build the request a `call` would send, without sending it.
    pub fn build_request(&self, operation: &str, params: Params) -> Result<HttpRequest, ApiError> {
        dispatch::build_request(self.spec(operation)?, &self.scope, params)
    }

    /// A new client whose default scope is `scope` layered over this one's.
    ///
    /// URL, timeouts, version and catalog are shared; the new client opens
    /// its own connection and `self` is left unchanged.
    pub fn scoped(&self, scope: Scope) -> Result<Client, ApiError> {
        let transport = self.connector.connect(&self.config)?;
        Ok(Client {
            config: self.config.clone(),
            scope: self.scope.merged(&scope),
            version: self.version.clone(),
            catalog: Arc::clone(&self.catalog),
            connector: Arc::clone(&self.connector),
            transport,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    pub fn open_timeout(&self) -> Duration {
        self.config.open_timeout
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn spec(&self, operation: &str) -> Result<&ApiSpec, ApiError> {
        self.catalog
            .get(operation)
            .ok_or_else(|| ApiError::UnknownOperation(operation.to_string()))
    }
}

/// Builder for `Client`. Every setting has a default, see `ClientConfig`.
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    scope: Scope,
    connector: Option<Arc<dyn Connector>>,
    registry: Option<CatalogRegistry>,
}

impl ClientBuilder {
    /// Start from an existing configuration, e.g. `ClientConfig::from_env()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Skip version detection and use this version's catalog.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn registry(mut self, registry: CatalogRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Client, ApiError> {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(UreqConnector::new()));
        let registry = match self.registry {
            Some(registry) => registry,
            None => CatalogRegistry::bundled()?,
        };

        let transport = connector.connect(&self.config)?;
        let version = match &self.config.version {
            Some(version) => version.clone(),
            None => fetch_version(transport.as_ref(), &self.scope)?,
        };
        let catalog = registry.for_version(&version)?;
        debug!(url = %self.config.url, %version, operations = catalog.len(), "client ready");

        let mut config = self.config;
        config.version = Some(version.clone());
        Ok(Client {
            config,
            scope: self.scope,
            version,
            catalog,
            connector,
            transport,
        })
    }
}

fn fetch_version(transport: &dyn Transport, scope: &Scope) -> Result<String, ApiError> {
    let info = Dispatcher::new(transport, scope).dispatch(&ApiSpec::new(["GET"], ["/"]), Params::new())?;
    let version = info
        .pointer("/version/number")
        .and_then(Value::as_str)
        .ok_or(ApiError::MissingVersion)?;
    debug!(version, "detected server version");
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::HttpMethod;
    use crate::transport::testing::{empty, json, ScriptedTransport};

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn root(version: &str) -> crate::http::HttpResponse {
        json(200, json!({"name": "node-1", "version": {"number": version}}))
    }

    fn client(transport: &ScriptedTransport, scope: Scope) -> Client {
        Client::builder()
            .version("7.10.2")
            .scope(scope)
            .connector(transport.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn detects_version_with_one_bootstrap_call() {
        let transport = ScriptedTransport::with_responses([root("7.10.2")]);
        let client = Client::builder().connector(transport.clone()).build().unwrap();

        assert_eq!(client.version(), "7.10.2");
        assert!(client.catalog().get("search").is_some());
        let sent = transport.script.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].path, "/");
        assert_eq!(transport.script.connects(), 1);
    }

    #[test]
    fn explicit_version_skips_bootstrap() {
        let transport = ScriptedTransport::default();
        let client = client(&transport, Scope::new());
        assert_eq!(client.version(), "7.10.2");
        assert!(transport.script.sent().is_empty());
    }

    #[test]
    fn missing_version_field_fails_construction() {
        let transport = ScriptedTransport::with_responses([json(200, json!({"tagline": "?"}))]);
        let err = Client::builder().connector(transport).build().unwrap_err();
        assert!(matches!(err, ApiError::MissingVersion));
    }

    #[test]
    fn unsupported_version_fails_construction() {
        let transport = ScriptedTransport::with_responses([root("2.4.6")]);
        let err = Client::builder().connector(transport).build().unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedVersion(v) if v == "2.4.6"));
    }

    #[test]
    fn bootstrap_server_error_is_surfaced() {
        let transport = ScriptedTransport::with_responses([empty(503)]);
        let err = Client::builder().connector(transport).build().unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn legacy_catalog_is_selected_by_major_minor() {
        let transport = ScriptedTransport::with_responses([
            root("6.8.23"),
            json(200, json!({"found": true})),
        ]);
        let client = Client::builder()
            .scope(Scope::new().with("index", "users").with("type", "user"))
            .connector(transport.clone())
            .build()
            .unwrap();

        client.call("get", params(json!({"id": "1"}))).unwrap();
        assert_eq!(transport.script.sent()[1].path, "/users/user/1");
    }

    #[test]
    fn call_dispatches_catalog_operation() {
        let transport = ScriptedTransport::with_responses([json(200, json!({"hits": {"total": {"value": 0}}}))]);
        let client = client(&transport, Scope::new().with("index", "users"));

        let value = client
            .call("search", params(json!({"body": {"query": {"match_all": {}}}, "size": 5})))
            .unwrap();

        assert_eq!(value["hits"]["total"]["value"], 0);
        let sent = transport.script.sent();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].path, "/users/_search");
        assert_eq!(sent[0].query, vec![("size".to_string(), "5".to_string())]);
    }

    #[test]
    fn unknown_operation_is_rejected_without_network() {
        let transport = ScriptedTransport::default();
        let client = client(&transport, Scope::new());
        let err = client.call("snapshot.create", Params::new()).unwrap_err();
        assert!(matches!(err, ApiError::UnknownOperation(name) if name == "snapshot.create"));
        assert!(transport.script.sent().is_empty());
    }

    #[test]
    fn head_operations_return_booleans() {
        let transport = ScriptedTransport::with_responses([empty(200), empty(404)]);
        let client = client(&transport, Scope::new());

        assert_eq!(client.call("indices.exists", params(json!({"index": "a"}))).unwrap(), Value::Bool(true));
        assert_eq!(client.call("indices.exists", params(json!({"index": "b"}))).unwrap(), Value::Bool(false));
    }

    #[test]
    fn scoped_merges_scope_and_leaves_original_untouched() {
        let transport = ScriptedTransport::default();
        let client = client(&transport, Scope::new().with("index", "users"));

        let scoped = client.scoped(Scope::new().with("id", "42")).unwrap();
        let req = scoped.build_request("get", Params::new()).unwrap();

        assert_eq!(req.path, "/users/_doc/42");
        assert_eq!(scoped.scope().get("index"), Some("users"));
        assert_eq!(scoped.scope().get("id"), Some("42"));
        assert_eq!(client.scope().get("id"), None);
        assert_eq!(scoped.version(), client.version());
        assert_eq!(scoped.url(), client.url());
        assert_eq!(scoped.read_timeout(), client.read_timeout());
    }

    #[test]
    fn scoped_opens_its_own_connection() {
        let transport = ScriptedTransport::default();
        let client = client(&transport, Scope::new());
        assert_eq!(transport.script.connects(), 1);

        let _scoped = client.scoped(Scope::new().with("index", "orders")).unwrap();
        assert_eq!(transport.script.connects(), 2);
    }

    #[test]
    fn per_call_scope_does_not_leak_into_client() {
        let transport = ScriptedTransport::default();
        let client = client(&transport, Scope::new().with("index", "users"));

        let req = client
            .build_request("get", params(json!({"index": "orders", "id": "1"})))
            .unwrap();
        assert_eq!(req.path, "/orders/_doc/1");
        assert_eq!(client.scope().get("index"), Some("users"));
    }

    #[test]
    fn ad_hoc_spec_can_be_requested() {
        let transport = ScriptedTransport::with_responses([json(200, json!({"acknowledged": true}))]);
        let client = client(&transport, Scope::new());
        let spec = ApiSpec::new(["PUT"], ["/_template/{name}"]);

        // `name` is not a scope key, so it stays a query parameter and the
        // template cannot resolve.
        let err = client.request(&spec, params(json!({"name": "logs"}))).unwrap_err();
        assert!(matches!(err, ApiError::PathResolution { .. }));

        let spec = ApiSpec::new(["PUT"], ["/_template/{id}"]);
        let value = client.request(&spec, params(json!({"id": "logs", "body": {}}))).unwrap();
        assert_eq!(value, json!({"acknowledged": true}));
    }

    #[test]
    fn timeouts_follow_the_builder() {
        let transport = ScriptedTransport::default();
        let client = Client::builder()
            .version("7.10.0")
            .read_timeout(Duration::from_secs(30))
            .open_timeout(Duration::from_millis(250))
            .connector(transport)
            .build()
            .unwrap();
        assert_eq!(client.read_timeout(), Duration::from_secs(30));
        assert_eq!(client.open_timeout(), Duration::from_millis(250));
        assert_eq!(client.url(), "http://localhost:9200");
    }
}
