//! HTTPS transport using the OnlineMQ REST binding.

use super::{Method, Transport, TransportRequest, TransportResponse};
use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::error::{ConfigurationError, LocalError, OmqError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "https_tests.rs"]
mod tests;

const XML_CONTENT_TYPE: &str = "application/xml";
const REST_VERSION_HEADER: &str = "X-Rest-Interface-Version";

/// Transport issuing real HTTP(S) requests with `reqwest`.
///
/// Every request carries the XML content negotiation headers, the Basic
/// authorization of the calling connection and the REST interface version.
/// The underlying client pools connections, so one transport should be shared
/// by all connections talking to the same endpoint.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    http_client: HttpClient,
    base_url: Url,
    rest_interface_version: String,
}

impl HttpsTransport {
    /// Create a transport for the endpoint described by `config`
    ///
    /// # Errors
    ///
    /// Returns a local error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self, OmqError> {
        config.validate()?;

        let mut base_url = Url::parse(&config.base_url).map_err(|e| ConfigurationError::Invalid {
            message: format!("Invalid base_url: {}", e),
        })?;
        // Resource paths are joined relative to the base, which needs a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LocalError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url,
            rest_interface_version: config.rest_interface_version.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &TransportRequest) -> Result<Url, OmqError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| ConfigurationError::Invalid {
                message: format!("Invalid resource path '{}': {}", request.path, e),
            })?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        credentials: &Credentials,
    ) -> Result<TransportResponse, OmqError> {
        let url = self.url_for(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        debug!(method = %request.method, path = %url.path(), "Sending OnlineMQ request");

        let mut builder = self
            .http_client
            .request(method, url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(ACCEPT, XML_CONTENT_TYPE)
            .header(AUTHORIZATION, credentials.authorization_header())
            .header(REST_VERSION_HEADER, self.rest_interface_version.as_str());

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LocalError::Timeout {
                    message: format!("Request timeout: {}", e),
                }
            } else if e.is_connect() {
                LocalError::ConnectionFailed {
                    message: format!("Connection failed: {}", e),
                }
            } else {
                LocalError::Transport {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LocalError::Timeout {
                    message: format!("Timed out reading response body: {}", e),
                }
            } else {
                LocalError::Transport {
                    message: format!("Failed to read response body: {}", e),
                }
            }
        })?;

        debug!(status, body_len = body.len(), "Received OnlineMQ response");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
