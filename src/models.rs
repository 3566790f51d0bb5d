//! Data models and structures
//!
//! Defines the image references passed between pipeline stages, the slot
//! maps produced per article, and environment configuration.

use crate::image::ConverterStrategy;
use crate::{Error, Result};
use base64::Engine as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Slot name → descriptive prompt, in the order the deriver returned them.
pub type PromptMap = IndexMap<String, String>;

/// Slot name → web-ready image reference. Partial maps are valid.
pub type GeneratedImageMap = IndexMap<String, ImageReference>;

/// Opaque handle to image bytes: a hosted URL or an embedded data URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Embed raw bytes as a `data:<mime>;base64,<payload>` reference.
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("data:{};base64,{}", mime, payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Split a base64 data URI into its mime type and decoded bytes.
    pub fn decode_data_uri(&self) -> Result<(String, Vec<u8>)> {
        let (mime, payload) = self
            .0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or_else(|| Error::InvalidReference("not a base64 data URI".to_string()))?;

        let mime_is_valid = !mime.is_empty()
            && mime
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '/' | '.'));
        if !mime_is_valid || payload.is_empty() {
            return Err(Error::InvalidReference(
                "malformed base64 data URI".to_string(),
            ));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::InvalidReference(format!("invalid base64 payload: {}", e)))?;

        Ok((mime.to_string(), bytes))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Data URIs can be megabytes long; keep log lines readable.
        if self.is_data_uri() && self.0.len() > 64 {
            let head: String = self.0.chars().take(48).collect();
            write!(f, "{}... ({} chars)", head, self.0.len())
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<String> for ImageReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ImageReference {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// External image-generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    #[default]
    Stability,
    Leonardo,
}

impl ImageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageProvider::Stability => "stability",
            ImageProvider::Leonardo => "leonardo",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            ImageProvider::Stability => ImageProvider::Leonardo,
            ImageProvider::Leonardo => ImageProvider::Stability,
        }
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stability" => Ok(ImageProvider::Stability),
            "leonardo" => Ok(ImageProvider::Leonardo),
            other => Err(Error::Config(format!(
                "Unknown image service '{}'. Expected 'stability' or 'leonardo'",
                other
            ))),
        }
    }
}

pub const DEFAULT_PROMPT_MODEL: &str = "openrouter/auto";
pub const DEFAULT_CONVERTER_URL: &str = "http://localhost:3001/convert-file";
pub const DEFAULT_WEBP_QUALITY: f32 = 85.0;
pub const DEFAULT_CONVERTER_PORT: u16 = 3001;
pub const DEFAULT_CONVERTER_OUTPUT_DIR: &str = "public/converted-images";

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub stability_api_key: Option<String>,
    pub leonardo_api_key: Option<String>,
    pub preferred_image_service: ImageProvider,
    pub converter: ConverterStrategy,
    pub converter_port: u16,
    pub converter_output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let preferred_image_service = match var("PREFERRED_IMAGE_SERVICE") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Unknown PREFERRED_IMAGE_SERVICE '{}', defaulting to stability",
                    value
                );
                ImageProvider::Stability
            }),
            None => ImageProvider::default(),
        };

        let quality = match var("WEBP_QUALITY") {
            Some(value) => {
                let quality: f32 = value.parse().map_err(|_| {
                    Error::Config(format!("WEBP_QUALITY '{}' is not a number", value))
                })?;
                if !(0.0..=100.0).contains(&quality) {
                    return Err(Error::Config(format!(
                        "WEBP_QUALITY {} is outside 0-100",
                        quality
                    )));
                }
                quality
            }
            None => DEFAULT_WEBP_QUALITY,
        };

        let converter = match var("WEBP_CONVERTER").as_deref() {
            None | Some("local") => ConverterStrategy::Local { quality },
            Some("remote") => ConverterStrategy::Remote {
                endpoint: var("WEBP_CONVERTER_URL")
                    .unwrap_or_else(|| DEFAULT_CONVERTER_URL.to_string()),
            },
            Some(other) => {
                return Err(Error::Config(format!(
                    "WEBP_CONVERTER '{}' must be 'local' or 'remote'",
                    other
                )))
            }
        };

        let converter_port = match var("CONVERTER_PORT") {
            Some(value) => value.parse().map_err(|_| {
                Error::Config(format!("CONVERTER_PORT '{}' is not a valid port", value))
            })?,
            None => DEFAULT_CONVERTER_PORT,
        };

        Ok(Self {
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            openrouter_model: var("OPENROUTER_MODEL")
                .unwrap_or_else(|| DEFAULT_PROMPT_MODEL.to_string()),
            stability_api_key: var("STABILITY_API_KEY"),
            leonardo_api_key: var("LEONARDO_API_KEY"),
            preferred_image_service,
            converter,
            converter_port,
            converter_output_dir: var("CONVERTER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONVERTER_OUTPUT_DIR)),
        })
    }

    pub fn api_key_for(&self, provider: ImageProvider) -> Option<&str> {
        match provider {
            ImageProvider::Stability => self.stability_api_key.as_deref(),
            ImageProvider::Leonardo => self.leonardo_api_key.as_deref(),
        }
    }

    /// Pick the image service for a request: the preferred one if it has a
    /// credential, else whichever provider does.
    pub fn resolve_image_provider(&self) -> Result<ImageProvider> {
        let preferred = self.preferred_image_service;
        if self.api_key_for(preferred).is_some() {
            return Ok(preferred);
        }
        if self.api_key_for(preferred.other()).is_some() {
            tracing::info!(
                "No {} API key configured, using {} instead",
                preferred,
                preferred.other()
            );
            return Ok(preferred.other());
        }
        Err(Error::Config(
            "Configure at least one image generation API key (Stability AI or Leonardo AI)"
                .to_string(),
        ))
    }
}
