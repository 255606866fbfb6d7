//! Error types for the quarry client.
//!
//! # Design
//! Errors split by where they originate. `Validation`, `UnknownOperation` and
//! `PathResolution` are raised while building a request, before any I/O.
//! `Server` and `Request` carry the full `HttpResponse` so callers can inspect
//! the status and raw body the cluster returned. `Transport` wraps failures
//! from the `Transport` implementation unchanged. Nothing here is retried.

use thiserror::Error;

use crate::http::HttpResponse;
use crate::scope::Scope;

/// Errors returned by the dispatcher and the `Client`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call was rejected before any network activity: a required body is
    /// missing, the spec declares an unknown method, or a parameter is malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The operation name is not present in the loaded catalog.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// No path template could be fully resolved from the available scope.
    #[error("API path not found: paths: {templates:?}, scope: {scope}")]
    PathResolution { templates: Vec<String>, scope: Scope },

    /// The server returned a status of 500 or above.
    #[error("server error (HTTP {}): {}", .0.status, .0.body)]
    Server(HttpResponse),

    /// The server answered with an error document (status below 500).
    #[error("request error (HTTP {}): {}", .0.status, .0.body)]
    Request(HttpResponse),

    /// The transport could not complete the round-trip.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A response declared as JSON could not be parsed.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The bootstrap response did not carry `version.number`.
    #[error("server version could not be determined from the root endpoint")]
    MissingVersion,

    /// No catalog is registered for the server's `major.minor` version.
    #[error("no API catalog registered for server version {0}")]
    UnsupportedVersion(String),
}

impl ApiError {
    /// The response carried by a `Server` or `Request` error.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            ApiError::Server(response) | ApiError::Request(response) => Some(response),
            _ => None,
        }
    }

    /// HTTP status of the carried response, if any.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }
}

/// Network-level failures reported by a `Transport`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("transport I/O failed: {0}")]
    Io(String),

    #[error("response body too large: {0}")]
    BodyTooLarge(String),
}
