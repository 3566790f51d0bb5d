//! Image acquisition for one article.
//!
//! Derives a prompt per image slot, generates each image in turn and
//! converts it to WebP, collecting whatever succeeds into a
//! [`GeneratedImageMap`]. Slots are processed one at a time so that
//! rate-limited providers never see a burst of concurrent requests.

use crate::ai::{ImageGenerator, OpenRouterPromptDeriver, PromptDeriver};
use crate::image::{build_converter, ImageConverter};
use crate::models::{Config, GeneratedImageMap, ImageProvider, PromptMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    pub article: String,
    /// Overrides the prompt deriver's default model.
    pub model: Option<String>,
    /// Overrides the prompt deriver's configured credential.
    pub api_key: Option<String>,
    pub provider: ImageProvider,
}

impl AcquisitionRequest {
    pub fn new(article: impl Into<String>, provider: ImageProvider) -> Self {
        Self {
            article: article.into(),
            model: None,
            api_key: None,
            provider,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// Empty article text; nothing ran and no hooks fired.
    Rejected,
    /// Another acquisition is in flight on this acquirer; dropped silently.
    Busy,
    /// Prompt derivation failed. Carries the message passed to `on_error`.
    Failed(String),
    /// Every slot was attempted. The map may be partial or empty.
    Completed(GeneratedImageMap),
}

impl AcquisitionOutcome {
    pub fn images(&self) -> Option<&GeneratedImageMap> {
        match self {
            AcquisitionOutcome::Completed(images) => Some(images),
            _ => None,
        }
    }

    pub fn into_images(self) -> Option<GeneratedImageMap> {
        match self {
            AcquisitionOutcome::Completed(images) => Some(images),
            _ => None,
        }
    }
}

/// Lifecycle notifications for the presentation layer.
///
/// All methods default to no-ops. `on_started` and `on_completed` fire once
/// per accepted request; `on_completed` fires on every exit path.
pub trait AcquisitionHooks: Send + Sync {
    fn on_started(&self) {}

    fn on_completed(&self) {}

    /// Fired once with the final map, only when it is non-empty.
    fn on_images_ready(&self, images: &GeneratedImageMap) {
        let _ = images;
    }

    /// Fired once when prompt derivation fails. Per-slot failures never reach here.
    fn on_error(&self, message: &str) {
        let _ = message;
    }
}

pub struct NoopHooks;

impl AcquisitionHooks for NoopHooks {}

/// Injectable collaborator bundle used to construct [`ImageAcquirer`].
pub struct AcquirerServices {
    pub deriver: Box<dyn PromptDeriver>,
    pub generator: ImageGenerator,
    pub converter: Box<dyn ImageConverter>,
}

pub struct ImageAcquirer {
    deriver: Box<dyn PromptDeriver>,
    generator: ImageGenerator,
    converter: Box<dyn ImageConverter>,
    hooks: Arc<dyn AcquisitionHooks>,
    busy: AtomicBool,
}

/// Marks an acquisition in flight. Dropping it clears the busy flag and
/// fires `on_completed`, whichever way the acquisition ends.
struct InFlight<'a> {
    busy: &'a AtomicBool,
    hooks: &'a dyn AcquisitionHooks,
}

impl<'a> InFlight<'a> {
    fn begin(busy: &'a AtomicBool, hooks: &'a dyn AcquisitionHooks) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        hooks.on_started();
        Some(Self { busy, hooks })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        self.hooks.on_completed();
    }
}

impl ImageAcquirer {
    pub fn with_services(services: AcquirerServices, hooks: Arc<dyn AcquisitionHooks>) -> Self {
        Self {
            deriver: services.deriver,
            generator: services.generator,
            converter: services.converter,
            hooks,
            busy: AtomicBool::new(false),
        }
    }

    /// Wire real collaborators from environment configuration.
    pub fn from_config(config: &Config, hooks: Arc<dyn AcquisitionHooks>) -> Self {
        // Reuse one HTTP connection pool across collaborators.
        let http_client = reqwest::Client::new();

        info!("Prompt deriver: OpenRouter (model: {})", config.openrouter_model);
        let deriver = OpenRouterPromptDeriver::new_with_client(
            config.openrouter_api_key.clone(),
            config.openrouter_model.clone(),
            http_client.clone(),
        );

        Self::with_services(
            AcquirerServices {
                deriver: Box::new(deriver),
                generator: ImageGenerator::from_config(config, http_client.clone()),
                converter: build_converter(&config.converter, http_client),
            },
            hooks,
        )
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one acquisition. See [`AcquisitionOutcome`] for what each result means.
    pub async fn acquire(&self, request: AcquisitionRequest) -> AcquisitionOutcome {
        if request.article.trim().is_empty() {
            debug!("Ignoring image acquisition for empty article");
            return AcquisitionOutcome::Rejected;
        }

        let Some(_in_flight) = InFlight::begin(&self.busy, self.hooks.as_ref()) else {
            debug!("Image acquisition already in flight, dropping request");
            return AcquisitionOutcome::Busy;
        };

        info!(
            "Starting image acquisition ({} chars, provider: {})",
            request.article.len(),
            request.provider
        );

        let prompts = match self
            .deriver
            .derive_prompts(
                &request.article,
                request.model.as_deref(),
                request.api_key.as_deref(),
            )
            .await
        {
            Ok(prompts) => prompts,
            Err(e) => {
                let mut message = e.to_string();
                if message.trim().is_empty() {
                    message = "Image generation failed".to_string();
                }
                error!("Image prompt derivation failed: {}", message);
                self.hooks.on_error(&message);
                return AcquisitionOutcome::Failed(message);
            }
        };

        let images = self.acquire_images(&prompts, request.provider).await;
        info!(
            "Image acquisition finished: {}/{} slot(s) filled",
            images.len(),
            prompts.len()
        );

        if !images.is_empty() {
            self.hooks.on_images_ready(&images);
        }

        AcquisitionOutcome::Completed(images)
    }

    async fn acquire_images(
        &self,
        prompts: &PromptMap,
        provider: ImageProvider,
    ) -> GeneratedImageMap {
        let mut images = GeneratedImageMap::new();

        for (slot, prompt) in prompts {
            info!("[{}] Generating image...", slot);

            let original = match self.generator.generate(prompt, provider).await {
                Ok(Some(reference)) => reference,
                Ok(None) => {
                    warn!("[{}] No image returned, skipping slot", slot);
                    continue;
                }
                Err(e) => {
                    warn!("[{}] Image generation failed, skipping slot: {}", slot, e);
                    continue;
                }
            };

            let outcome = self.converter.convert(&original).await;
            if outcome.is_converted() {
                info!("[{}] Converted to WebP", slot);
            } else {
                warn!("[{}] Using original image: {}", slot, original);
            }

            images.insert(slot.clone(), outcome.into_reference());
        }

        images
    }
}
