//! Error types for mstpd

use sonic_mstp::MstpError;
use thiserror::Error;

/// MSTP daemon errors
#[derive(Error, Debug)]
pub enum MstpdError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Error raised by the MSTP node
    #[error(transparent)]
    Node(#[from] MstpError),
}

impl From<reqwest::Error> for MstpdError {
    fn from(e: reqwest::Error) -> Self {
        MstpdError::Http(e.to_string())
    }
}

/// Result type for mstpd operations
pub type Result<T> = std::result::Result<T, MstpdError>;
