use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::{AspectRatio, ImageMime},
    protocol::{fields, GenerateResponse},
};
use tracing::{debug, info, warn};
use url::Url;

pub mod error;
pub mod form;
pub mod resources;
pub mod settings;

pub use error::{DownloadError, FormError, GenerateError, SettingsError};
pub use form::{CandidateFile, FormController, FormSnapshot, SelectedFile};
pub use resources::{ObjectUrl, ObjectUrlRegistry};
pub use settings::{load_settings, resolve_settings, ImagePolicy, Settings};

/// Reference image attached to a generation request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime: ImageMime,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub image: Option<ImageAttachment>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

/// Remote side of the form: one generation call and one image fetch.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns the URL of the generated image.
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError>;
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

pub struct HttpGenerationBackend {
    http: Client,
    generate_url: Url,
}

impl HttpGenerationBackend {
    pub fn new(settings: &Settings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(http: Client, settings: &Settings) -> Self {
        Self {
            http,
            generate_url: settings.generate_url(),
        }
    }

    pub fn generate_url(&self) -> &Url {
        &self.generate_url
    }

    fn build_form(request: GenerateRequest) -> Result<Form, GenerateError> {
        let mut form = Form::new();
        if let Some(image) = request.image {
            let part = Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name)
                .mime_str(image.mime.as_str())
                .map_err(|e| GenerateError::Transport(e.to_string()))?;
            form = form.part(fields::IMAGE, part);
        }
        Ok(form
            .text(fields::PROMPT, request.prompt)
            .text(fields::ASPECT_RATIO, request.aspect_ratio.as_str()))
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError> {
        debug!(
            url = %self.generate_url,
            has_image = request.image.is_some(),
            prompt_chars = request.prompt.chars().count(),
            aspect_ratio = %request.aspect_ratio,
            "assembling generate request"
        );
        let form = Self::build_form(request)?;
        let response = self
            .http
            .post(self.generate_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<GenerateResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.api_error().message().map(str::to_owned));
            warn!(status = status.as_u16(), ?message, "generation service returned an error");
            return Err(GenerateError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_slice(&body)
            .map_err(|e| GenerateError::MalformedResponse(e.to_string()))?;
        let url = parsed
            .generated_image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                GenerateError::MalformedResponse(
                    "response is missing generated_image_url".to_string(),
                )
            })?;
        info!(status = status.as_u16(), "generation service returned an image");
        Ok(url)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
