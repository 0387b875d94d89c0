//! Form controller: owns the form state, validates input and runs the
//! single in-flight generation request.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::domain::{AspectRatio, ImageMime, DOWNLOAD_FILENAME, MAX_IMAGE_BYTES, MAX_PROMPT_CHARS};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::{FormError, GenerateError},
    resources::{save_as, ObjectUrl, ObjectUrlRegistry},
    settings::{ImagePolicy, Settings},
    GenerateRequest, GenerationBackend, ImageAttachment,
};

const FALLBACK_MIME: &str = "application/octet-stream";

/// A file offered to the form that has not been validated yet.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    /// Type is checked first, then size; rejected files are never read.
    pub async fn from_path(path: &Path) -> Result<Self, FormError> {
        let read_err = |source| FormError::ReadFile {
            path: path.to_path_buf(),
            source,
        };
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        if mime_type.parse::<ImageMime>().is_err() {
            return Err(FormError::InvalidFileType { mime_type });
        }
        let size_bytes = tokio::fs::metadata(path).await.map_err(read_err)?.len();
        if size_bytes > MAX_IMAGE_BYTES {
            return Err(FormError::FileTooLarge { size_bytes });
        }
        let bytes = tokio::fs::read(path).await.map_err(read_err)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A file that passed validation and is attached to the form.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: ImageMime,
    pub size_bytes: u64,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn attachment(&self) -> ImageAttachment {
        ImageAttachment {
            file_name: self.name.clone(),
            mime: self.mime,
            bytes: self.bytes.clone(),
        }
    }
}

/// Checks type first, then size.
pub fn validate_candidate(candidate: &CandidateFile) -> Result<ImageMime, FormError> {
    let mime = candidate
        .mime_type
        .parse::<ImageMime>()
        .map_err(|_| FormError::InvalidFileType {
            mime_type: candidate.mime_type.clone(),
        })?;
    let size_bytes = candidate.size_bytes();
    if size_bytes > MAX_IMAGE_BYTES {
        return Err(FormError::FileTooLarge { size_bytes });
    }
    Ok(mime)
}

/// Read-only view of the form for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    pub file_name: Option<String>,
    pub preview_url: Option<String>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub generated_image: Option<String>,
    pub is_loading: bool,
}

impl FormSnapshot {
    pub fn prompt_counter(&self) -> String {
        format!("{}/{}", self.prompt.chars().count(), MAX_PROMPT_CHARS)
    }
}

#[derive(Default)]
struct FormState {
    selected: Option<SelectedFile>,
    preview: Option<ObjectUrl>,
    prompt: String,
    aspect_ratio: AspectRatio,
    generated_image: Option<String>,
}

/// Holds the loading flag for the duration of one submission.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct FormController {
    backend: Arc<dyn GenerationBackend>,
    settings: Settings,
    objects: ObjectUrlRegistry,
    state: Mutex<FormState>,
    loading: AtomicBool,
}

impl FormController {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: Settings) -> Self {
        Self::with_registry(backend, settings, ObjectUrlRegistry::new())
    }

    pub fn with_registry(
        backend: Arc<dyn GenerationBackend>,
        settings: Settings,
        objects: ObjectUrlRegistry,
    ) -> Self {
        Self {
            backend,
            settings,
            objects,
            state: Mutex::new(FormState::default()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        let guard = self.state.lock().await;
        FormSnapshot {
            file_name: guard.selected.as_ref().map(|file| file.name.clone()),
            preview_url: guard.preview.as_ref().map(|p| p.url().to_string()),
            prompt: guard.prompt.clone(),
            aspect_ratio: guard.aspect_ratio,
            generated_image: guard.generated_image.clone(),
            is_loading: self.is_loading(),
        }
    }

    pub async fn selected_file(&self) -> Option<SelectedFile> {
        self.state.lock().await.selected.clone()
    }

    /// Validates and attaches a file. A rejected file leaves the form as it was.
    pub async fn accept_file(&self, candidate: CandidateFile) -> Result<(), FormError> {
        let mime = match validate_candidate(&candidate) {
            Ok(mime) => mime,
            Err(err) => {
                warn!(
                    file = %candidate.name,
                    mime_type = %candidate.mime_type,
                    size_bytes = candidate.size_bytes(),
                    "rejected image file"
                );
                return Err(err);
            }
        };

        let size_bytes = candidate.size_bytes();
        info!(file = %candidate.name, %mime, size_bytes, "image file accepted");
        let bytes: Arc<[u8]> = Arc::from(candidate.bytes);
        let preview = self.objects.create(bytes.clone(), mime.as_str());

        let mut guard = self.state.lock().await;
        // Replacing the handle releases the previous preview.
        guard.preview = Some(preview);
        guard.selected = Some(SelectedFile {
            name: candidate.name,
            mime,
            size_bytes,
            bytes,
        });
        Ok(())
    }

    /// Drag-and-drop delivers a list; only the first file is considered.
    pub async fn drop_files(&self, files: Vec<CandidateFile>) -> Result<(), FormError> {
        match files.into_iter().next() {
            Some(first) => self.accept_file(first).await,
            None => Ok(()),
        }
    }

    /// Applies a prompt edit. Edits over the character cap are ignored and
    /// `false` is returned.
    pub async fn set_prompt(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.chars().count() > MAX_PROMPT_CHARS {
            return false;
        }
        self.state.lock().await.prompt = text;
        true
    }

    pub async fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) {
        self.state.lock().await.aspect_ratio = aspect_ratio;
    }

    /// Runs one generation round trip and returns the generated image URL.
    pub async fn submit(&self) -> Result<String, FormError> {
        let (request, _in_flight) = {
            let mut guard = self.state.lock().await;
            self.check_preconditions(&guard)?;
            let in_flight = InFlight::acquire(&self.loading).ok_or(FormError::Busy)?;
            guard.generated_image = None;
            let request = GenerateRequest {
                image: guard.selected.as_ref().map(SelectedFile::attachment),
                prompt: guard.prompt.clone(),
                aspect_ratio: guard.aspect_ratio,
            };
            (request, in_flight)
        };

        info!(
            has_image = request.image.is_some(),
            prompt_chars = request.prompt.chars().count(),
            aspect_ratio = %request.aspect_ratio,
            timeout_ms = self.settings.request_timeout.as_millis() as u64,
            "submitting generation request"
        );

        // Dropping the call on timeout cancels it; a late response is never observed.
        let outcome =
            match tokio::time::timeout(self.settings.request_timeout, self.backend.generate(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerateError::Timeout),
            };

        match outcome {
            Ok(url) => {
                self.state.lock().await.generated_image = Some(url.clone());
                info!(%url, "generated image ready");
                Ok(url)
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                Err(err.into())
            }
        }
    }

    fn check_preconditions(&self, state: &FormState) -> Result<(), FormError> {
        match self.settings.image_policy {
            ImagePolicy::Required if state.selected.is_none() || state.prompt.is_empty() => {
                Err(FormError::MissingImageAndPrompt)
            }
            _ if state.prompt.is_empty() => Err(FormError::MissingPrompt),
            _ => Ok(()),
        }
    }

    /// Fetches the generated image and saves it as `generated.png` in the
    /// configured download directory. The form state is not modified.
    pub async fn download(&self) -> Result<PathBuf, FormError> {
        let url = self
            .state
            .lock()
            .await
            .generated_image
            .clone()
            .ok_or(FormError::NothingToDownload)?;

        let result = self.download_from(&url).await;
        match &result {
            Ok(path) => info!(path = %path.display(), "generated image saved"),
            Err(err) => warn!(error = %err, "download failed"),
        }
        result
    }

    async fn download_from(&self, url: &str) -> Result<PathBuf, FormError> {
        let bytes = self.backend.fetch_image(url).await?;
        let staged = self.objects.create(Arc::from(bytes), "image/png");
        let saved = save_as(&staged, &self.settings.download_dir, DOWNLOAD_FILENAME).await;
        staged.revoke();
        Ok(saved?)
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
