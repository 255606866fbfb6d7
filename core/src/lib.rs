//! Versioned REST client core for search clusters.
//!
//! # Overview
//! Given an `ApiSpec` (allowed methods, candidate path templates, body
//! requirement) and call parameters, the dispatcher produces exactly one
//! HTTP request, sends it through a `Transport`, and classifies the response
//! into a JSON value or an `ApiError`.
//!
//! # Design
//! - `Client` detects the server version once and selects the matching
//!   `Catalog` of named operations from a `CatalogRegistry`.
//! - Request building and response parsing are pure (`dispatch::build_request`,
//!   `dispatch::parse_response`); the `Transport` is the only I/O boundary.
//! - Path templates are filled from a per-call `Scope` layered over the
//!   client's default scope; the longest fully-resolvable template wins.
//! - Request bodies are classified into a `RequestBody` variant and encoded
//!   once, either as one JSON document or as newline-delimited JSON.

pub mod body;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod path;
pub mod scope;
pub mod transport;

/// Call parameters. Consumed by each call.
pub type Params = serde_json::Map<String, serde_json::Value>;

pub use body::RequestBody;
pub use catalog::{ApiSpec, Catalog, CatalogRegistry};
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use dispatch::Dispatcher;
pub use error::{ApiError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use scope::Scope;
pub use transport::{Connector, Transport, UreqConnector, UreqTransport};
