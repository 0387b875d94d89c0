//! Error types surfaced by the form controller. `Display` on each variant is
//! the notice shown to the user.

use std::{io, path::PathBuf};

use thiserror::Error;

pub const GENERATE_FALLBACK_MESSAGE: &str = "Failed to generate image.";
pub const TIMEOUT_MESSAGE: &str = "The server did not respond in time. Please try again.";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,
    #[error("{}", .message.as_deref().unwrap_or(GENERATE_FALLBACK_MESSAGE))]
    Server { status: u16, message: Option<String> },
    #[error("Error: {0}")]
    Transport(String),
    #[error("Error: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GenerateError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            GenerateError::MalformedResponse(value.to_string())
        } else {
            GenerateError::Transport(value.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to download image.")]
    Status { status: u16 },
    #[error("Error: {0}")]
    Transport(String),
    #[error("Error: local resource {0} was already released")]
    Released(String),
    #[error("Error: failed to save {}: {source}", .path.display())]
    Save { path: PathBuf, source: io::Error },
}

impl From<reqwest::Error> for DownloadError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => DownloadError::Status {
                status: status.as_u16(),
            },
            None => DownloadError::Transport(value.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Please provide a prompt.")]
    MissingPrompt,
    #[error("Please provide an image and a prompt.")]
    MissingImageAndPrompt,
    #[error("Invalid file type. Please upload a jpeg, png, gif, or webp image.")]
    InvalidFileType { mime_type: String },
    #[error("Image size must be under 10MB.")]
    FileTooLarge { size_bytes: u64 },
    #[error("Error: failed to read {}: {source}", .path.display())]
    ReadFile { path: PathBuf, source: io::Error },
    #[error("A generation request is already in progress.")]
    Busy,
    #[error("There is no generated image to download.")]
    NothingToDownload,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl FormError {
    /// Errors detected before any network activity.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FormError::MissingPrompt
                | FormError::MissingImageAndPrompt
                | FormError::InvalidFileType { .. }
                | FormError::FileTooLarge { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FormError::Generate(GenerateError::Timeout))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings file: {0}")]
    File(#[from] toml::de::Error),
    #[error("invalid api base url '{value}': {source}")]
    BaseUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("api base url '{0}' must use http or https")]
    Scheme(String),
    #[error("invalid value '{value}' for {key}")]
    Value { key: &'static str, value: String },
}
