use super::mime::extension_for_mime;
use super::source::load_source;
use super::ConversionStrategy;
use crate::models::ImageReference;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

/// Multipart field the conversion endpoint reads the upload from.
pub const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Deserialize)]
struct ConvertFileResponse {
    url: Option<String>,
}

/// Uploads the source bytes to a conversion endpoint and returns the URL it
/// answers with.
pub struct RemoteWebpConverter {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl RemoteWebpConverter {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self {
            client,
            endpoint,
            timeout: Duration::from_secs(60),
        }
    }

    /// Endpoints may answer with a path relative to their own origin.
    fn resolve(&self, url: &str) -> Result<ImageReference> {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
            return Ok(ImageReference::new(url));
        }

        let base = Url::parse(&self.endpoint).map_err(|e| {
            Error::Conversion(format!("Invalid converter endpoint {}: {}", self.endpoint, e))
        })?;
        let resolved = base
            .join(url)
            .map_err(|e| Error::Conversion(format!("Invalid converted URL {}: {}", url, e)))?;
        Ok(ImageReference::new(resolved.to_string()))
    }
}

#[async_trait]
impl ConversionStrategy for RemoteWebpConverter {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn try_convert(&self, reference: &ImageReference) -> Result<ImageReference> {
        let source = load_source(&self.client, reference).await?;

        let part = Part::bytes(source.bytes)
            .file_name(format!("image.{}", extension_for_mime(&source.mime)))
            .mime_str(&source.mime)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Conversion(format!(
                "Converter endpoint returned status {}: {}",
                status, error_text
            )));
        }

        let body: ConvertFileResponse = response.json().await?;
        let url = body
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::Conversion("Converter response has no url".to_string()))?;

        self.resolve(&url)
    }
}
