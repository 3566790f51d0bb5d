use super::source::load_source;
use super::webp::{encode_webp, WebpOptions};
use super::ConversionStrategy;
use crate::models::ImageReference;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;

/// Re-encodes in-process and returns an embedded `image/webp` data URI.
pub struct LocalWebpConverter {
    client: Client,
    options: WebpOptions,
}

impl LocalWebpConverter {
    pub fn new(client: Client, quality: f32) -> Self {
        Self {
            client,
            options: WebpOptions::photo().with_quality(quality),
        }
    }
}

#[async_trait]
impl ConversionStrategy for LocalWebpConverter {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn try_convert(&self, reference: &ImageReference) -> Result<ImageReference> {
        let source = load_source(&self.client, reference).await?;
        let options = self.options;

        let webp = tokio::task::spawn_blocking(move || encode_webp(&source.bytes, options))
            .await
            .map_err(|e| Error::Invariant(format!("WebP encoding task join error: {}", e)))??;

        Ok(ImageReference::from_bytes("image/webp", &webp))
    }
}
