use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the chat backend sends alongside non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A 2xx response whose body does not carry what the protocol requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("response body is not valid: {0}")]
    Malformed(String),
}
