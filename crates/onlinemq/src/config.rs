//! Client configuration.
//!
//! Controls the service endpoint, request timeout and the protocol constants
//! sent with every request. Configuration can be built in code or loaded from
//! an optional file layered under `OMQ__*` environment variables.

use crate::error::ConfigurationError;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables read by [`ClientConfig::load`]
pub const ENV_PREFIX: &str = "OMQ";

/// Configuration for OnlineMQ client behavior.
///
/// # Examples
///
/// ```
/// use onlinemq::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("https://mq.example.test")
///     .with_timeout(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service base URL
    pub base_url: String,
    /// Request timeout duration
    #[serde(rename = "timeout_seconds", deserialize_with = "duration_from_secs")]
    pub timeout: Duration,
    /// User agent string for requests
    pub user_agent: String,
    /// Value of the `X-Rest-Interface-Version` header
    pub rest_interface_version: String,
    /// Suffix appended to every resource path (selects the XML representation)
    pub url_postfix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mq.onlinemq.com".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "onlinemq-rust/0.1.0".to_string(),
            rest_interface_version: "1.0".to_string(),
            url_postfix: ".xml".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from an optional file and the environment.
    ///
    /// Sources, later ones overriding earlier ones:
    ///  1. built-in defaults
    ///  2. `file`, if given (format chosen by extension; must exist)
    ///  3. environment variables prefixed `OMQ__`, e.g. `OMQ__TIMEOUT_SECONDS=10`
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let config: ClientConfig =
            settings
                .try_deserialize()
                .map_err(|e| ConfigurationError::Parsing {
                    message: e.to_string(),
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let url = url::Url::parse(&self.base_url).map_err(|e| ConfigurationError::Invalid {
            message: format!("base_url '{}' is not a valid URL: {}", self.base_url, e),
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigurationError::Invalid {
                message: format!("base_url scheme must be http or https, got '{}'", url.scheme()),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::Invalid {
                message: "timeout must be greater than zero".to_string(),
            });
        }

        if self.rest_interface_version.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                message: "rest_interface_version cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the resource path suffix.
    pub fn with_url_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.url_postfix = postfix.into();
        self
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn rest_interface_version(mut self, version: impl Into<String>) -> Self {
        self.config.rest_interface_version = version.into();
        self
    }

    pub fn url_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.config.url_postfix = postfix.into();
        self
    }

    /// Build the final configuration, validating it.
    pub fn build(self) -> Result<ClientConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
