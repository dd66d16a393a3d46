use thiserror::Error;

/// Terminal failure of one load, delivered once through `did_fail`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Load cancelled")]
    Cancelled,

    #[error("Captured body exceeds limit of {limit} bytes")]
    CaptureOverflow { limit: usize },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LoadError::Timeout
        } else if e.is_redirect() {
            LoadError::TooManyRedirects
        } else if e.is_builder() {
            LoadError::InvalidUrl(e.to_string())
        } else {
            LoadError::Transport(e.to_string())
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e.to_string())
    }
}
