use std::io;
use thiserror::Error;

/// Unified error type for the ask client
#[derive(Error, Debug)]
pub enum AskError {
    /// The request did not complete within the connect or overall timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, TLS failure and the like
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with an HTTP error status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The conversation already holds the maximum number of messages
    #[error("Conversation is full ({0} messages), message rejected")]
    CapacityExceeded(usize),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// The configured model is not in the catalog
    #[error("'{0}' is not a valid model")]
    InvalidModel(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AskError {
    /// Timeouts are the only failures worth another attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AskError::Timeout(_))
    }
}

impl From<reqwest::Error> for AskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AskError::Timeout(err.to_string())
        } else if err.is_connect() {
            AskError::Network(format!("Connection failed: {}", err))
        } else {
            AskError::Network(format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for AskError {
    fn from(err: serde_json::Error) -> Self {
        AskError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for AskError {
    fn from(err: serde_yml::Error) -> Self {
        AskError::Serialization(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_timeouts() {
        assert!(AskError::Timeout("slow".into()).is_timeout());
        assert!(!AskError::Network("refused".into()).is_timeout());
        assert!(
            !AskError::Api {
                status: 504,
                message: "gateway".into()
            }
            .is_timeout()
        );
    }

    #[test]
    fn api_error_message_names_status() {
        let err = AskError::Api {
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error (HTTP 401): Incorrect API key provided"
        );
    }
}
