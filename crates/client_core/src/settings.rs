use std::{fs, path::PathBuf, time::Duration};

use serde::Deserialize;
use shared::protocol::GENERATE_PATH;
use url::Url;

use crate::error::SettingsError;

pub const SETTINGS_FILE: &str = "imagegen.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Whether a reference image must accompany every submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePolicy {
    #[default]
    Optional,
    Required,
}

impl ImagePolicy {
    pub fn from_required(required: bool) -> Self {
        if required {
            ImagePolicy::Required
        } else {
            ImagePolicy::Optional
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub image_policy: ImagePolicy,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            image_policy: ImagePolicy::Optional,
            download_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, SettingsError> {
        self.api_base_url = parse_base_url(raw)?;
        Ok(self)
    }

    /// `{api_base_url}/generate`, keeping any path prefix on the base URL.
    pub fn generate_url(&self) -> Url {
        let mut base = self.api_base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(GENERATE_PATH)
            .expect("relative endpoint path always joins")
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    require_image: Option<bool>,
    download_dir: Option<PathBuf>,
}

pub fn load_settings() -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Layers defaults, file contents and environment lookups, in that order.
pub fn resolve_settings(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = parse_base_url(&v)?;
        }
        if let Some(v) = file_cfg.request_timeout_ms {
            settings.request_timeout = parse_timeout(&v.to_string())?;
        }
        if let Some(v) = file_cfg.require_image {
            settings.image_policy = ImagePolicy::from_required(v);
        }
        if let Some(v) = file_cfg.download_dir {
            settings.download_dir = v;
        }
    }

    if let Some(v) = env("IMAGEGEN_API_URL") {
        settings.api_base_url = parse_base_url(&v)?;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = parse_base_url(&v)?;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout = parse_timeout(&v)?;
    }

    if let Some(v) = env("APP__REQUIRE_IMAGE") {
        let required = parse_bool(&v).ok_or(SettingsError::Value {
            key: "APP__REQUIRE_IMAGE",
            value: v.clone(),
        })?;
        settings.image_policy = ImagePolicy::from_required(required);
    }

    if let Some(v) = env("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }

    Ok(settings)
}

pub fn parse_base_url(raw: &str) -> Result<Url, SettingsError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|source| SettingsError::BaseUrl {
        value: trimmed.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(SettingsError::Scheme(trimmed.to_string())),
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, SettingsError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(SettingsError::Value {
            key: "request_timeout_ms",
            value: raw.to_string(),
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
