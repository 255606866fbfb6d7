//! The network seam.
//!
//! # Design
//! The dispatcher never talks to the network itself. It hands a finished
//! `HttpRequest` to a `Transport` and gets an `HttpResponse` back, with 4xx and
//! 5xx statuses returned as data rather than errors. A `Connector` builds the
//! transport once per `Client`, which keeps connection setup explicit and
//! avoids lazy initialization on first use.
//!
//! `UreqTransport` is the default blocking implementation. Its connector
//! applies the client's open/read timeouts and then an optional configuration
//! hook, so callers can add headers, proxies or TLS settings.

use std::fmt;
use std::sync::Arc;

use ureq::config::ConfigBuilder;
use ureq::typestate::{AgentScope, WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Builds the `Transport` a `Client` uses for all of its calls.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, TransportError>;
}

type ConfigureHook = dyn Fn(ConfigBuilder<AgentScope>) -> ConfigBuilder<AgentScope> + Send + Sync;

/// Connector producing `UreqTransport`s.
#[derive(Clone, Default)]
pub struct UreqConnector {
    hook: Option<Arc<ConfigureHook>>,
}

impl UreqConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that adjusts the agent configuration. It runs once per
    /// connection, after the client's timeouts have been applied.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConfigBuilder<AgentScope>) -> ConfigBuilder<AgentScope> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for UreqConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqConnector")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl Connector for UreqConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, TransportError> {
        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.open_timeout))
            .timeout_recv_response(Some(config.read_timeout))
            .timeout_recv_body(Some(config.read_timeout));
        if let Some(hook) = &self.hook {
            builder = hook(builder);
        }

        tracing::debug!(url = %config.url, "opening connection");
        Ok(Box::new(UreqTransport {
            agent: builder.build().new_agent(),
            base_url: config.url.trim_end_matches('/').to_string(),
        }))
    }
}

/// Blocking transport backed by a `ureq::Agent`.
pub struct UreqTransport {
    agent: Agent,
    base_url: String,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let result = match request.method {
            HttpMethod::Head => send_without_body(self.agent.head(&url), &request),
            HttpMethod::Get => send_without_body(self.agent.get(&url), &request),
            HttpMethod::Delete => send_without_body(self.agent.delete(&url), &request),
            HttpMethod::Post => send_with_body(self.agent.post(&url), &request),
            HttpMethod::Put => send_with_body(self.agent.put(&url), &request),
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = match request.method {
            HttpMethod::Head => String::new(),
            _ => response
                .body_mut()
                .with_config()
                .limit(u64::MAX)
                .read_to_string()
                .map_err(transport_error)?,
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Attach query, headers and the per-request timeout override.
fn decorate<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(timeout) = request.timeout {
        builder = builder
            .config()
            .timeout_recv_response(Some(timeout))
            .timeout_recv_body(Some(timeout))
            .build();
    }
    builder
}

// GET and DELETE may still carry a body (search, delete-by-query).
fn send_without_body(
    builder: RequestBuilder<WithoutBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    let builder = decorate(builder, request);
    match (&request.body, request.method.carries_body()) {
        (Some(body), true) => builder.force_send_body().send(body.as_bytes()),
        _ => builder.call(),
    }
}

fn send_with_body(
    builder: RequestBuilder<WithBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    let builder = decorate(builder, request);
    match &request.body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn transport_error(err: ureq::Error) -> TransportError {
    match &err {
        ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
        ureq::Error::Io(_) => TransportError::Io(err.to_string()),
        ureq::Error::BodyExceedsLimit(_) => TransportError::BodyTooLarge(err.to_string()),
        _ => TransportError::Connection(err.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport used by the dispatcher and client tests.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub struct Script {
        pub responses: Mutex<VecDeque<HttpResponse>>,
        pub sent: Mutex<Vec<HttpRequest>>,
        pub connects: Mutex<usize>,
    }

    impl Script {
        pub fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }

        pub fn connects(&self) -> usize {
            *self.connects.lock().unwrap()
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![(
                "content-type".to_string(),
                "application/json; charset=UTF-8".to_string(),
            )],
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Replays queued responses in order and records every request.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        pub script: Arc<Script>,
    }

    impl ScriptedTransport {
        pub fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
            let transport = Self::default();
            transport.script.responses.lock().unwrap().extend(responses);
            transport
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.script.sent.lock().unwrap().push(request);
            self.script
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Connection("no scripted response".to_string()))
        }
    }

    impl Connector for ScriptedTransport {
        fn connect(&self, _config: &ClientConfig) -> Result<Box<dyn Transport>, TransportError> {
            *self.script.connects.lock().unwrap() += 1;
            Ok(Box::new(self.clone()))
        }
    }
}
