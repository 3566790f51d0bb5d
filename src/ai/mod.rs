//! AI service integration for image prompts and image generation
//!
//! The prompt deriver turns article text into per-slot prompts; image
//! generation services turn a prompt into an image reference. Both are
//! external collaborators of the acquisition pipeline.

pub mod http;
pub mod leonardo;
pub mod mock;
pub mod openrouter;
pub mod stability;

pub use leonardo::LeonardoImageClient;
pub use mock::{MockImageGenerationClient, MockPromptDeriver};
pub use openrouter::OpenRouterPromptDeriver;
pub use stability::StabilityImageClient;

use crate::models::{Config, ImageProvider, ImageReference, PromptMap};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

#[async_trait]
pub trait PromptDeriver: Send + Sync {
    /// Map article text to slot → image prompt. `model` and `api_key`
    /// override the deriver's configured defaults when given.
    async fn derive_prompts(
        &self,
        article: &str,
        model: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<PromptMap>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// `Ok(None)` means the provider answered but produced no image.
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageReference>>;
}

/// Routes generation requests to the client registered for each provider.
#[derive(Default)]
pub struct ImageGenerator {
    clients: HashMap<ImageProvider, Box<dyn ImageGenerationService>>,
}

impl ImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(
        mut self,
        provider: ImageProvider,
        client: Box<dyn ImageGenerationService>,
    ) -> Self {
        self.clients.insert(provider, client);
        self
    }

    /// Register a client for every provider that has a credential configured.
    pub fn from_config(config: &Config, http_client: reqwest::Client) -> Self {
        let mut generator = Self::new();

        if let Some(api_key) = config.api_key_for(ImageProvider::Stability) {
            info!(
                "Image provider: Stability AI (engine: {})",
                stability::DEFAULT_ENGINE
            );
            generator = generator.with_provider(
                ImageProvider::Stability,
                Box::new(StabilityImageClient::new_with_client(
                    api_key.to_string(),
                    stability::DEFAULT_ENGINE.to_string(),
                    http_client.clone(),
                )),
            );
        }

        if let Some(api_key) = config.api_key_for(ImageProvider::Leonardo) {
            info!(
                "Image provider: Leonardo AI (model: {})",
                leonardo::DEFAULT_MODEL_ID
            );
            generator = generator.with_provider(
                ImageProvider::Leonardo,
                Box::new(LeonardoImageClient::new_with_client(
                    api_key.to_string(),
                    leonardo::DEFAULT_MODEL_ID.to_string(),
                    http_client,
                )),
            );
        }

        generator
    }

    pub fn has_provider(&self, provider: ImageProvider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// Generate one image with the selected provider. Empty references are
    /// reported as `None`.
    pub async fn generate(
        &self,
        prompt: &str,
        provider: ImageProvider,
    ) -> Result<Option<ImageReference>> {
        let client = self.clients.get(&provider).ok_or_else(|| {
            Error::AiProvider(format!("No {} image client configured", provider))
        })?;

        Ok(client
            .generate_image(prompt)
            .await?
            .filter(|reference| !reference.is_empty()))
    }
}
