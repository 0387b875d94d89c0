use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Path of the generation endpoint, relative to the service base URL.
pub const GENERATE_PATH: &str = "generate";

/// Multipart field names understood by the generation service.
pub mod fields {
    pub const IMAGE: &str = "image";
    pub const PROMPT: &str = "prompt";
    pub const ASPECT_RATIO: &str = "aspect_ratio";
}

/// Body of a generation response. Success and failure share one shape on
/// the wire; the HTTP status decides which field is meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            generated_image_url: Some(url.into()),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            generated_image_url: None,
            error: Some(message.into()),
        }
    }

    pub fn api_error(&self) -> ApiError {
        ApiError {
            error: self.error.clone(),
        }
    }
}
