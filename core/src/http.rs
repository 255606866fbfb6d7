//! HTTP types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! dispatcher builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network; a `Transport` executes the round-trip in
//! between. `HttpRequest::path` is relative to the connection's base URL.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be handed to
//! the transport by value and is never mutated after it has been built.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Head,
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Head => "HEAD",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a body is attached when one is supplied.
    pub fn carries_body(self) -> bool {
        !matches!(self, HttpMethod::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HEAD" => Ok(HttpMethod::Head),
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(ApiError::Validation(format!(
                "Unknown HTTP request method: {s:?}"
            ))),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by the dispatcher. `timeout` overrides the connection's default read
/// timeout for this request only.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

/// An HTTP response described as plain data, as returned by a `Transport`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// True when the media type (parameters stripped) ends in `json`, which
    /// covers `application/json` and vendor types such as
    /// `application/vnd.elasticsearch+json`.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .and_then(|value| value.split(';').next())
            .map(|media| media.trim().to_ascii_lowercase().ends_with("json"))
            .unwrap_or(false)
    }

    /// Parse the body according to the content type.
    pub fn parse_body(&self) -> Result<ResponseBody, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(ResponseBody::Empty);
        }
        if !self.is_json() {
            return Ok(ResponseBody::Text(self.body.clone()));
        }
        serde_json::from_str(&self.body)
            .map(ResponseBody::Json)
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// A response body after content-type aware parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// True for a JSON object carrying an `"error"` key.
    pub fn is_error_document(&self) -> bool {
        matches!(self, ResponseBody::Json(Value::Object(map)) if map.contains_key("error"))
    }

    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Empty => Value::Null,
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}
