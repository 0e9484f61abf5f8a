//! Unified error types for cdp-pilot

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for cdp-pilot
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The duplex channel was lost while commands were still outstanding
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    /// CDP error payload carried by a command response
    #[error("CDP error on {method}: {message} (code {code})")]
    Protocol {
        /// Method the failing command was issued with
        method: String,
        /// CDP error code
        code: i64,
        /// CDP error message
        message: String,
        /// Additional error data, if any
        data: Option<serde_json::Value>,
    },

    /// HTTP discovery failures (target list/create)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// HTTP transport errors from the discovery endpoints
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Browser process launch failures
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload decode errors (e.g. base64 screenshot data)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new discovery error
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Error::Discovery(msg.into())
    }

    /// Create a new launch error
    pub fn launch<S: Into<String>>(msg: S) -> Self {
        Error::Launch(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a protocol error from a CDP error payload
    pub fn protocol(method: &str, payload: &serde_json::Value) -> Self {
        Error::Protocol {
            method: method.to_string(),
            code: payload.get("code").and_then(|c| c.as_i64()).unwrap_or(-1),
            message: payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
            data: payload.get("data").cloned(),
        }
    }
}
