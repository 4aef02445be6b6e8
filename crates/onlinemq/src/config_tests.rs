//! Tests for client configuration.

use super::*;
use serial_test::serial;
use std::io::Write;

fn clear_env() {
    for key in [
        "OMQ__BASE_URL",
        "OMQ__TIMEOUT_SECONDS",
        "OMQ__USER_AGENT",
        "OMQ__URL_POSTFIX",
    ] {
        std::env::remove_var(key);
    }
}

mod defaults_tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ClientConfig::default();

        assert_eq!(config.base_url, "https://mq.onlinemq.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, "onlinemq-rust/0.1.0");
        assert_eq!(config.rest_interface_version, "1.0");
        assert_eq!(config.url_postfix, ".xml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_setters() {
        let config = ClientConfig::default()
            .with_base_url("http://localhost:8080")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test/1.0")
            .with_url_postfix("");

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test/1.0");
        assert_eq!(config.url_postfix, "");
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .base_url("https://mq.example.test")
            .timeout(Duration::from_secs(2))
            .rest_interface_version("1.1")
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://mq.example.test");
        assert_eq!(config.rest_interface_version, "1.1");
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_invalid_base_url() {
        let result = ClientConfig::builder().base_url("not a url").build();

        assert!(matches!(result, Err(ConfigurationError::Invalid { .. })));
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = ClientConfig::default().with_base_url("ftp://mq.onlinemq.com");

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let config = ClientConfig::default().with_timeout(Duration::ZERO);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_rest_version() {
        let result = ClientConfig::builder().rest_interface_version(" ").build();

        assert!(result.is_err());
    }
}

mod loading_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_load_without_sources_yields_defaults() {
        clear_env();

        let config = ClientConfig::load(None).unwrap();

        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "base_url = \"https://staging.mq.example.test\"\ntimeout_seconds = 12"
        )
        .unwrap();

        let config = ClientConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.base_url, "https://staging.mq.example.test");
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.url_postfix, ".xml");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "timeout_seconds = 12").unwrap();
        std::env::set_var("OMQ__TIMEOUT_SECONDS", "3");
        std::env::set_var("OMQ__USER_AGENT", "env-agent");

        let result = ClientConfig::load(Some(file.path()));
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "env-agent");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        clear_env();

        let result = ClientConfig::load(Some(Path::new("/nonexistent/onlinemq.toml")));

        assert!(matches!(result, Err(ConfigurationError::Parsing { .. })));
    }

    #[test]
    #[serial]
    fn test_loaded_config_is_validated() {
        clear_env();
        std::env::set_var("OMQ__BASE_URL", "nope");

        let result = ClientConfig::load(None);
        clear_env();

        assert!(matches!(result, Err(ConfigurationError::Invalid { .. })));
    }
}
