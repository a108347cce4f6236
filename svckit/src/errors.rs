use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound request to the analytics backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Timeout error: {endpoint} did not answer within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("HTTP {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl FetchError {
    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Transport { endpoint, .. }
            | FetchError::Timeout { endpoint, .. }
            | FetchError::Status { endpoint, .. }
            | FetchError::Decode { endpoint, .. } => endpoint,
        }
    }

    /// True when the backend could not be reached at all, as opposed to
    /// answering with an error status or an unreadable body.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, FetchError::Transport { .. } | FetchError::Timeout { .. })
    }
}

/// Failure to produce a displayable live frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Frame is empty")]
    Empty,

    #[error("Frame decode error: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
