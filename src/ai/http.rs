use crate::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Bearer-authenticated JSON client shared by the provider modules.
pub struct ProviderHttpClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    provider: &'static str,
}

impl ProviderHttpClient {
    pub fn new_with_client(
        provider: &'static str,
        api_key: Option<String>,
        base_url: &str,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            provider,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        self.post_with_key(path, request, None).await
    }

    /// POST with a per-call credential that takes precedence over the configured one.
    pub async fn post_with_key<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
        api_key: Option<&str>,
    ) -> Result<Resp> {
        let builder = self.client.post(self.url(path)).json(request);
        self.send(builder, api_key).await
    }

    pub async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp> {
        let builder = self.client.get(self.url(path));
        self.send(builder, None).await
    }

    async fn send<Resp: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        api_key: Option<&str>,
    ) -> Result<Resp> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .or(self.api_key.as_deref())
            .ok_or_else(|| Error::AiProvider(format!("{} API key is missing", self.provider)))?;

        let response = builder
            .timeout(self.timeout)
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to {}: {}", self.provider, e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!(
                "{} API error (status {}): {}",
                self.provider,
                status,
                error_text
            );
            return Err(Error::AiProvider(format!(
                "{} API error (status {}): {}",
                self.provider, status, error_text
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                "Failed to parse {} response: {}\nBody: {}",
                self.provider,
                e,
                body
            );
            Error::AiProvider(format!("Failed to parse {} response: {}", self.provider, e))
        })
    }
}
