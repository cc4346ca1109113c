use std::path::PathBuf;
use thiserror::Error;

/// Malformed form configuration. Fatal for the dialog being constructed.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("field '{key}': {message}")]
    Invalid { key: String, message: String },
}

impl SchemaError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single remote call. Cloned into loader messages, so it
/// only carries owned text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for a user-facing notification.
    pub fn friendly_message(&self) -> String {
        match self {
            GatewayError::Http { status, .. } => match *status {
                401 => "Your session has expired. Sign in again and retry.".to_string(),
                403 => "You do not have permission to perform this action.".to_string(),
                404 => "The requested resource was not found.".to_string(),
                422 => "Some required fields are missing or have an invalid format.".to_string(),
                s if s >= 500 => format!("The server failed to process the request (HTTP {s})."),
                s => format!("The request was rejected (HTTP {s})."),
            },
            GatewayError::Network(_) | GatewayError::Decode(_) => {
                "Could not reach the server. Check your connection and retry.".to_string()
            }
        }
    }
}
