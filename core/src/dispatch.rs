//! Request dispatch: spec + parameters in, classified result out.
//!
//! # Design
//! Dispatch is split the same way the rest of the crate is. `build_request`
//! turns an `ApiSpec` and call parameters into an `HttpRequest` without any
//! I/O, `parse_response` classifies the `HttpResponse`, and
//! `Dispatcher::dispatch` runs one `Transport::send` between the two. Every
//! validation and resolution failure therefore happens before the transport
//! is touched.

use serde_json::Value;
use tracing::{debug, warn};

use crate::body;
use crate::catalog::ApiSpec;
use crate::config::seconds;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
use crate::path;
use crate::scope::{extract_scopes, Scope};
use crate::transport::Transport;
use crate::Params;

/// POST wins wherever it appears; otherwise the first declared method.
pub fn select_method(methods: &[String]) -> Result<HttpMethod, ApiError> {
    if methods.iter().any(|m| m.eq_ignore_ascii_case("POST")) {
        return Ok(HttpMethod::Post);
    }
    methods
        .first()
        .ok_or_else(|| ApiError::Validation("API spec declares no HTTP methods".to_string()))?
        .parse()
}

/// Build the single request described by `spec` and `params`.
///
/// `params` is consumed: `body`, the scope keys and `read_timeout` are
/// removed, and whatever remains is sent as query parameters.
pub fn build_request(spec: &ApiSpec, defaults: &Scope, mut params: Params) -> Result<HttpRequest, ApiError> {
    if spec.body_required() && !params.contains_key("body") {
        return Err(ApiError::Validation("Body is missing".to_string()));
    }

    let body = match params.remove("body") {
        Some(value) => body::normalize(value)?,
        None => None,
    };
    let call_scope = extract_scopes(&mut params);
    let timeout = match params.remove("read_timeout") {
        Some(value) => read_timeout(&value)?,
        None => None,
    };

    let path = path::resolve(&spec.url.paths, &call_scope, defaults)?;
    let method = select_method(&spec.methods)?;

    let query = params
        .into_iter()
        .filter_map(|(key, value)| query_value(value).map(|v| (key, v)))
        .collect();

    let (body, headers) = match body {
        Some((payload, content_type)) if method.carries_body() => (
            Some(payload),
            vec![("content-type".to_string(), content_type.to_string())],
        ),
        _ => (None, Vec::new()),
    };

    Ok(HttpRequest {
        method,
        path,
        query,
        headers,
        body,
        timeout,
    })
}

/// Turn a response into the call result.
///
/// HEAD maps 200 to `true` and 404 to `false`; any other HEAD status goes
/// through the same classification as every other method.
pub fn parse_response(method: HttpMethod, response: HttpResponse) -> Result<Value, ApiError> {
    if method == HttpMethod::Head {
        match response.status {
            200 => return Ok(Value::Bool(true)),
            404 => return Ok(Value::Bool(false)),
            _ => {}
        }
    }
    classify(response).map(ResponseBody::into_value)
}

/// Server failures first, then error-shaped documents, otherwise success.
pub fn classify(response: HttpResponse) -> Result<ResponseBody, ApiError> {
    if response.status >= 500 {
        warn!(status = response.status, "server error");
        return Err(ApiError::Server(response));
    }
    let body = response.parse_body()?;
    if body.is_error_document() {
        warn!(status = response.status, "request rejected");
        return Err(ApiError::Request(response));
    }
    Ok(body)
}

fn read_timeout(value: &Value) -> Result<Option<std::time::Duration>, ApiError> {
    let secs = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    secs.and_then(seconds).map(Some).ok_or_else(|| {
        ApiError::Validation(format!(
            "read_timeout must be a non-negative number of seconds, got {value}"
        ))
    })
}

fn query_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Sends built requests through a transport on behalf of one scope.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    defaults: &'a Scope,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn Transport, defaults: &'a Scope) -> Self {
        Self { transport, defaults }
    }

    pub fn dispatch(&self, spec: &ApiSpec, params: Params) -> Result<Value, ApiError> {
        let request = build_request(spec, self.defaults, params)?;
        let method = request.method;
        debug!(
            method = %method,
            path = %request.path,
            query = request.query.len(),
            body_bytes = request.body.as_ref().map_or(0, String::len),
            "dispatching request"
        );
        let response = self.transport.send(request)?;
        debug!(status = response.status, "received response");
        parse_response(method, response)
    }
}
