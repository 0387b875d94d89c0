use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the generation service on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// Server-provided message, verbatim. Blank strings count as absent.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown aspect ratio '{0}'")]
    UnknownAspectRatio(String),
    #[error("unsupported image type '{0}'")]
    UnsupportedMimeType(String),
}
