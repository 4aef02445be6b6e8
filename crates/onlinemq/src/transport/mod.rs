//! Transport capability used by the connection.
//!
//! A [`Transport`] executes one request against the service and hands back the
//! raw status, headers and body. It owns everything below the protocol
//! binding: TLS, connection reuse, timeouts. The connection never interprets
//! anything a transport does beyond the returned [`TransportResponse`].
//!
//! Two implementations ship with the crate:
//! - [`HttpsTransport`]: the production binding over `reqwest`
//! - [`InMemoryServer`]: an in-process emulation of the service for tests and
//!   offline development

mod https;
mod memory;

use crate::auth::Credentials;
use crate::error::OmqError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

pub use https::HttpsTransport;
pub use memory::{InMemoryServer, QueueDefinition};

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    /// Resource path relative to the service base URL, e.g. `/queues/30.xml`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Get the first query parameter with this name
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw reply to a [`TransportRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lower-case
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Any status of 400 or above is an error reply from the server
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Executes requests against the service on behalf of a connection.
///
/// Implementations must be safe to share between tasks; a connection may be
/// cloned and used concurrently. Failures to obtain any reply (network, TLS,
/// timeout) are returned as local errors; every reply, including error
/// statuses, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: TransportRequest,
        credentials: &Credentials,
    ) -> Result<TransportResponse, OmqError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
