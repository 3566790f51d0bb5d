//! Stability AI text-to-image client.

use crate::ai::http::ProviderHttpClient;
use crate::ai::ImageGenerationService;
use crate::image::mime::sniff_image_mime;
use crate::models::ImageReference;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai";
pub const DEFAULT_ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

#[derive(Debug, Serialize)]
struct TextToImageRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: f32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
    weight: f32,
}

#[derive(Debug, Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: Option<String>,
    finish_reason: Option<String>,
}

pub struct StabilityImageClient {
    http: ProviderHttpClient,
    engine: String,
}

impl StabilityImageClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_client(api_key, DEFAULT_ENGINE.to_string(), reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, engine: String, client: reqwest::Client) -> Self {
        Self {
            http: ProviderHttpClient::new_with_client(
                "Stability AI",
                Some(api_key),
                DEFAULT_BASE_URL,
                Duration::from_secs(120),
                client,
            ),
            engine,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }
}

#[async_trait]
impl ImageGenerationService for StabilityImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageReference>> {
        let request = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: prompt.to_string(),
                weight: 1.0,
            }],
            cfg_scale: 7.0,
            height: 1024,
            width: 1024,
            samples: 1,
            steps: 30,
        };

        let path = format!("/v1/generation/{}/text-to-image", self.engine);
        let response: TextToImageResponse = self.http.post(&path, &request).await?;

        let Some(artifact) = response.artifacts.into_iter().find(|a| a.base64.is_some()) else {
            tracing::warn!("Stability AI returned no image artifacts");
            return Ok(None);
        };

        if let Some(reason) = artifact.finish_reason.as_deref() {
            if reason != "SUCCESS" {
                tracing::warn!("Stability AI artifact finished with {}", reason);
            }
        }

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(artifact.base64.unwrap_or_default())
            .map_err(|e| {
                Error::AiProvider(format!("Failed to decode Stability AI base64 image: {}", e))
            })?;

        if bytes.is_empty() {
            return Ok(None);
        }

        Ok(Some(ImageReference::from_bytes(
            sniff_image_mime(&bytes),
            &bytes,
        )))
    }
}
