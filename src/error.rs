use thiserror::Error;

/// Errors raised by the load generator library
#[derive(Debug, Error)]
pub enum LoadgenError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    #[error("Unexpected response from {url}: HTTP {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Malformed response body: {0}")]
    Decode(String),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadgenError>;

impl LoadgenError {
    /// Whether the request never produced an HTTP response
    pub fn is_transport(&self) -> bool {
        matches!(self, LoadgenError::Transport { .. })
    }
}

impl From<reqwest::Error> for LoadgenError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timeout"
        } else if error.is_connect() {
            "connect"
        } else if error.is_body() || error.is_decode() {
            "body"
        } else {
            "request"
        };
        LoadgenError::Transport {
            kind,
            message: error.to_string(),
        }
    }
}
