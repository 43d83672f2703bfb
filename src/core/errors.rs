//! Error types for the conversational client.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// HTTP request failed before a usable body was received.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Gender hint pattern failed to compile.
    #[error("invalid voice hint pattern: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A send was issued while another one is still awaiting its response.
    #[error("a message is already awaiting a response")]
    DispatchInFlight,
    /// The platform speech engine refused an utterance.
    #[error("speech engine error: {0}")]
    Speech(String),
}

/// Convenience result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
