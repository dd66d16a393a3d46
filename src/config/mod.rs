//! Configuration management for loadbox
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use loadbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("I/O threads: {}", config.transport.io_threads);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `LOADBOX__<section>__<key>`:
//! - `LOADBOX__TRANSPORT__IO_THREADS=8`
//! - `LOADBOX__DISPATCHER__DRAIN_TIMEOUT_MS=1000`
//! - `LOADBOX__DISPATCHER__MAX_CAPTURE_BYTES=16MB`
//!
//! # Configuration File
//!
//! Read from `config/loadbox.toml` unless `LOADBOX_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, DispatcherConfig, TransportConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("loadbox.toml");

        let toml_content = r#"
[dispatcher]
drain_poll_interval_ms = 10
drain_timeout_ms = 2000
fatal_on_drain_timeout = false
sync_poll_interval_ms = 1
max_capture_bytes = "8MB"

[transport]
io_threads = 8
connect_timeout_ms = 3000
request_timeout_ms = 30000
user_agent = "loadbox-test"
max_redirects = 3
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let policy = config.dispatcher.drain_policy();
        assert_eq!(policy.poll_interval, Duration::from_millis(10));
        assert_eq!(policy.timeout, Duration::from_secs(2));
        assert!(!config.dispatcher.fatal_on_drain_timeout);
        assert_eq!(config.dispatcher.sync_poll_interval(), Duration::from_millis(1));
        assert_eq!(config.transport.io_threads, 8);
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.transport.max_redirects, 3);
    }

    #[test]
    fn test_validation_rejects_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("loadbox.toml");

        fs::write(&config_path, "[transport]\nio_threads = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroValue { .. })
        ));
    }

    #[test]
    fn test_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(rendered.contains("[dispatcher]"));
        assert!(rendered.contains("max_capture_bytes = \"64MB\""));
        assert!(!rendered.contains("proxy"));
    }
}
