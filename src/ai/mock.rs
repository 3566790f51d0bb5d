use super::{ImageGenerationService, PromptDeriver};
use crate::models::{ImageReference, PromptMap};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Arguments a [`MockPromptDeriver`] was called with.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveCall {
    pub article: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct MockPromptDeriver {
    prompts: Arc<Mutex<PromptMap>>,
    failure: Arc<Mutex<Option<String>>>,
    gate: Option<Arc<Notify>>,
    calls: Arc<Mutex<Vec<DeriveCall>>>,
}

impl MockPromptDeriver {
    pub fn new() -> Self {
        Self {
            prompts: Arc::new(Mutex::new(PromptMap::new())),
            failure: Arc::new(Mutex::new(None)),
            gate: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_prompt(self, slot: &str, prompt: &str) -> Self {
        self.prompts
            .lock()
            .unwrap()
            .insert(slot.to_string(), prompt.to_string());
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Hold every call until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<DeriveCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockPromptDeriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptDeriver for MockPromptDeriver {
    async fn derive_prompts(
        &self,
        article: &str,
        model: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<PromptMap> {
        self.calls.lock().unwrap().push(DeriveCall {
            article: article.to_string(),
            model: model.map(str::to_string),
            api_key: api_key.map(str::to_string),
        });

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::AiProvider(message));
        }

        Ok(self.prompts.lock().unwrap().clone())
    }
}

#[derive(Clone)]
pub struct MockImageGenerationClient {
    image_responses: Arc<Mutex<Vec<ImageReference>>>,
    failing_prompts: Arc<Mutex<HashSet<String>>>,
    empty_prompts: Arc<Mutex<HashSet<String>>>,
    prompts_seen: Arc<Mutex<Vec<String>>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            image_responses: Arc::new(Mutex::new(Vec::new())),
            failing_prompts: Arc::new(Mutex::new(HashSet::new())),
            empty_prompts: Arc::new(Mutex::new(HashSet::new())),
            prompts_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_image_response(self, reference: ImageReference) -> Self {
        self.image_responses.lock().unwrap().push(reference);
        self
    }

    pub fn with_failure_for(self, prompt: &str) -> Self {
        self.failing_prompts
            .lock()
            .unwrap()
            .insert(prompt.to_string());
        self
    }

    pub fn with_empty_result_for(self, prompt: &str) -> Self {
        self.empty_prompts.lock().unwrap().insert(prompt.to_string());
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.prompts_seen.lock().unwrap().len()
    }

    pub fn get_prompts_seen(&self) -> Vec<String> {
        self.prompts_seen.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageReference>> {
        let count = {
            let mut seen = self.prompts_seen.lock().unwrap();
            seen.push(prompt.to_string());
            seen.len()
        };

        if self.failing_prompts.lock().unwrap().contains(prompt) {
            return Err(Error::AiProvider(format!(
                "Mock generation failure for '{}'",
                prompt
            )));
        }
        if self.empty_prompts.lock().unwrap().contains(prompt) {
            return Ok(None);
        }

        let responses = self.image_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Some(ImageReference::new(format!(
                "https://mock-images.example.com/{}.png",
                count
            ))))
        } else {
            let index = (count - 1) % responses.len();
            Ok(Some(responses[index].clone()))
        }
    }
}
