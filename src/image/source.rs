//! Loading the bytes behind an [`ImageReference`].

use super::mime::sniff_image_mime;
use crate::models::ImageReference;
use crate::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Decode an embedded data URI in-process or download a hosted URL.
pub async fn load_source(client: &Client, reference: &ImageReference) -> Result<SourceImage> {
    if reference.is_data_uri() {
        let (mime, bytes) = reference.decode_data_uri()?;
        return Ok(SourceImage { mime, bytes });
    }

    if !reference.is_remote() {
        return Err(Error::InvalidReference(format!(
            "unsupported image reference: {}",
            reference
        )));
    }

    tracing::debug!("Fetching source image {}", reference);
    let response = client
        .get(reference.as_str())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(Error::Conversion(format!(
            "Fetching {} failed with status {}",
            reference,
            response.status()
        )));
    }

    let header_mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
        .filter(|value| value.starts_with("image/"));

    let bytes = response.bytes().await?.to_vec();
    if bytes.is_empty() {
        return Err(Error::Conversion(format!("{} returned no bytes", reference)));
    }

    let mime = header_mime.unwrap_or_else(|| sniff_image_mime(&bytes).to_string());
    Ok(SourceImage { mime, bytes })
}
