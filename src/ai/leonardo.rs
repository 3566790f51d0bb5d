//! Leonardo AI generation client.
//!
//! Leonardo generations are asynchronous: a job is submitted, then polled
//! until it reports `COMPLETE` or `FAILED`. The finished image is returned as
//! the hosted URL Leonardo serves it from.

use crate::ai::http::ProviderHttpClient;
use crate::ai::ImageGenerationService;
use crate::models::ImageReference;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://cloud.leonardo.ai";
const GENERATIONS_PATH: &str = "/api/rest/v1/generations";
pub const DEFAULT_MODEL_ID: &str = "b24e16ff-06e3-43eb-8d33-4416c2d75876";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest {
    prompt: String,
    model_id: String,
    width: u32,
    height: u32,
    num_images: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationResponse {
    sd_generation_job: GenerationJob,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationJob {
    generation_id: String,
}

#[derive(Debug, Deserialize)]
struct GenerationStatusResponse {
    generations_by_pk: Option<GenerationStatus>,
}

#[derive(Debug, Deserialize)]
struct GenerationStatus {
    status: String,
    #[serde(default)]
    generated_images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

pub struct LeonardoImageClient {
    http: ProviderHttpClient,
    model_id: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl LeonardoImageClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_client(api_key, DEFAULT_MODEL_ID.to_string(), reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model_id: String, client: reqwest::Client) -> Self {
        Self {
            http: ProviderHttpClient::new_with_client(
                "Leonardo AI",
                Some(api_key),
                DEFAULT_BASE_URL,
                Duration::from_secs(30),
                client,
            ),
            model_id,
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn wait_for_generation(&self, generation_id: &str) -> Result<Option<ImageReference>> {
        let path = format!("{}/{}", GENERATIONS_PATH, generation_id);

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response: GenerationStatusResponse = self.http.get(&path).await?;
            let Some(generation) = response.generations_by_pk else {
                tracing::debug!("Leonardo generation {} not visible yet", generation_id);
                continue;
            };

            match generation.status.as_str() {
                "COMPLETE" => {
                    let url = generation
                        .generated_images
                        .into_iter()
                        .find_map(|image| image.url.filter(|u| !u.trim().is_empty()));
                    return Ok(url.map(ImageReference::from));
                }
                "FAILED" => {
                    return Err(Error::AiProvider(format!(
                        "Leonardo generation {} failed",
                        generation_id
                    )))
                }
                status => tracing::debug!(
                    "Leonardo generation {} is {} (poll {}/{})",
                    generation_id,
                    status,
                    poll,
                    self.max_polls
                ),
            }
        }

        Err(Error::AiProvider(format!(
            "Leonardo generation {} did not complete after {} polls",
            generation_id, self.max_polls
        )))
    }
}

#[async_trait]
impl ImageGenerationService for LeonardoImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageReference>> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            model_id: self.model_id.clone(),
            width: 1024,
            height: 768,
            num_images: 1,
        };

        let response: GenerationResponse = self.http.post(GENERATIONS_PATH, &request).await?;
        let generation_id = response.sd_generation_job.generation_id;
        tracing::debug!("Submitted Leonardo generation {}", generation_id);

        self.wait_for_generation(&generation_id).await
    }
}
