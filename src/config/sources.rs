use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LOADBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/loadbox.toml";
const ENV_PREFIX: &str = "LOADBOX";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LOADBOX__TRANSPORT__IO_THREADS -> transport.io_threads
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.dispatcher.drain_timeout_ms, 5_000);
        assert_eq!(config.transport.io_threads, 4);
        assert!(config.transport.proxy.is_none());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[dispatcher]
drain_timeout_ms = 250
max_capture_bytes = "2MB"

[transport]
io_threads = 2
user_agent = "probe/1.0"
proxy = "http://proxy:3128"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.dispatcher.drain_timeout_ms, 250);
        assert_eq!(config.dispatcher.max_capture_bytes.as_u64(), 2 * 1024 * 1024);
        assert_eq!(config.dispatcher.drain_poll_interval_ms, 20);
        assert_eq!(config.transport.io_threads, 2);
        assert_eq!(config.transport.user_agent, "probe/1.0");
        assert_eq!(config.transport.proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_integer_capture_size() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[dispatcher]\nmax_capture_bytes = 4096\n").unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.dispatcher.max_capture_bytes.as_u64(), 4096);
    }
}
