use super::models::{Config, DispatcherConfig, TransportConfig};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    ZeroValue { field: &'static str },

    #[error("drain_poll_interval_ms ({poll}) must be shorter than drain_timeout_ms ({timeout})")]
    PollExceedsTimeout { poll: u64, timeout: u64 },

    #[error("io_threads ({0}) exceeds limit of 256")]
    TooManyIoThreads(usize),

    #[error("Invalid proxy URL '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("max_redirects ({0}) exceeds limit of 50")]
    TooManyRedirects(usize),

    #[error("user_agent must not be empty")]
    EmptyUserAgent,
}

const MAX_IO_THREADS: usize = 256;
const MAX_REDIRECTS: usize = 50;

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatcher(&config.dispatcher)?;
    validate_transport(&config.transport)?;
    Ok(())
}

fn validate_dispatcher(dispatcher: &DispatcherConfig) -> Result<(), ValidationError> {
    if dispatcher.drain_poll_interval_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "dispatcher.drain_poll_interval_ms",
        });
    }
    if dispatcher.drain_timeout_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "dispatcher.drain_timeout_ms",
        });
    }
    if dispatcher.drain_poll_interval_ms >= dispatcher.drain_timeout_ms {
        return Err(ValidationError::PollExceedsTimeout {
            poll: dispatcher.drain_poll_interval_ms,
            timeout: dispatcher.drain_timeout_ms,
        });
    }
    if dispatcher.sync_poll_interval_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "dispatcher.sync_poll_interval_ms",
        });
    }
    if dispatcher.max_capture_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroValue {
            field: "dispatcher.max_capture_bytes",
        });
    }
    Ok(())
}

fn validate_transport(transport: &TransportConfig) -> Result<(), ValidationError> {
    if transport.io_threads == 0 {
        return Err(ValidationError::ZeroValue {
            field: "transport.io_threads",
        });
    }
    if transport.io_threads > MAX_IO_THREADS {
        return Err(ValidationError::TooManyIoThreads(transport.io_threads));
    }
    if transport.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "transport.connect_timeout_ms",
        });
    }
    if transport.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroValue {
            field: "transport.request_timeout_ms",
        });
    }
    if transport.max_redirects > MAX_REDIRECTS {
        return Err(ValidationError::TooManyRedirects(transport.max_redirects));
    }
    if transport.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if let Some(proxy) = &transport.proxy {
        let parsed = Url::parse(proxy).map_err(|e| ValidationError::InvalidProxy {
            url: proxy.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https" | "socks5" | "socks5h") {
            return Err(ValidationError::InvalidProxy {
                url: proxy.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_drain_timeout() {
        let mut config = Config::default();
        config.dispatcher.drain_timeout_ms = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "dispatcher.drain_timeout_ms"
            })
        ));
    }

    #[test]
    fn test_poll_longer_than_timeout() {
        let mut config = Config::default();
        config.dispatcher.drain_poll_interval_ms = 100;
        config.dispatcher.drain_timeout_ms = 50;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::PollExceedsTimeout { poll: 100, timeout: 50 })
        ));
    }

    #[test]
    fn test_zero_capture_limit() {
        let mut config = Config::default();
        config.dispatcher.max_capture_bytes = ByteSize(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_io_thread_bounds() {
        let mut config = Config::default();
        config.transport.io_threads = 0;
        assert!(validate(&config).is_err());

        config.transport.io_threads = 1_000;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooManyIoThreads(1_000))
        ));
    }

    #[test]
    fn test_proxy_url() {
        let mut config = Config::default();
        config.transport.proxy = Some("http://proxy:8080".to_string());
        assert!(validate(&config).is_ok());

        config.transport.proxy = Some("not a url".to_string());
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidProxy { .. })
        ));

        config.transport.proxy = Some("ftp://proxy:21".to_string());
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidProxy { .. })
        ));
    }

    #[test]
    fn test_redirect_limit() {
        let mut config = Config::default();
        config.transport.max_redirects = 0;
        assert!(validate(&config).is_ok());

        config.transport.max_redirects = 51;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooManyRedirects(51))
        ));
    }

    #[test]
    fn test_empty_user_agent() {
        let mut config = Config::default();
        config.transport.user_agent = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyUserAgent)));
    }
}
