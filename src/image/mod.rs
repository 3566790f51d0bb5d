//! Image format conversion
//!
//! Re-encodes generated images into compact WebP before they reach the
//! document. Conversion is best-effort: callers always get a usable
//! reference back, either the converted one or the original.

pub mod local;
pub mod mime;
pub mod mock;
pub mod remote;
pub mod source;
pub mod webp;

pub use local::LocalWebpConverter;
pub use mock::MockConversionStrategy;
pub use remote::RemoteWebpConverter;

use crate::models::{ImageReference, DEFAULT_WEBP_QUALITY};
use crate::Result;
use async_trait::async_trait;

/// Result of converting one reference. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted(ImageReference),
    /// Conversion failed; the input reference is passed through unchanged.
    Fallback(ImageReference),
}

impl ConversionOutcome {
    pub fn reference(&self) -> &ImageReference {
        match self {
            ConversionOutcome::Converted(reference) | ConversionOutcome::Fallback(reference) => {
                reference
            }
        }
    }

    pub fn into_reference(self) -> ImageReference {
        match self {
            ConversionOutcome::Converted(reference) | ConversionOutcome::Fallback(reference) => {
                reference
            }
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }
}

/// The contract the acquisition pipeline sees: convert, never fail.
#[async_trait]
pub trait ImageConverter: Send + Sync {
    async fn convert(&self, reference: &ImageReference) -> ConversionOutcome;
}

/// A fallible way of producing a WebP reference.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_convert(&self, reference: &ImageReference) -> Result<ImageReference>;
}

/// Wraps a strategy so that every failure becomes an identity fallback.
pub struct BestEffortConverter<S> {
    strategy: S,
}

impl<S: ConversionStrategy> BestEffortConverter<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl<S: ConversionStrategy> ImageConverter for BestEffortConverter<S> {
    async fn convert(&self, reference: &ImageReference) -> ConversionOutcome {
        match self.strategy.try_convert(reference).await {
            Ok(converted) if !converted.is_empty() => ConversionOutcome::Converted(converted),
            Ok(_) => {
                tracing::warn!(
                    "{} WebP conversion returned an empty reference, keeping original",
                    self.strategy.name()
                );
                ConversionOutcome::Fallback(reference.clone())
            }
            Err(e) => {
                tracing::warn!(
                    "{} WebP conversion failed, keeping original: {}",
                    self.strategy.name(),
                    e
                );
                ConversionOutcome::Fallback(reference.clone())
            }
        }
    }
}

/// Deployment-level choice of converter.
#[derive(Debug, Clone, PartialEq)]
pub enum ConverterStrategy {
    Local { quality: f32 },
    Remote { endpoint: String },
}

impl Default for ConverterStrategy {
    fn default() -> Self {
        ConverterStrategy::Local {
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

pub fn build_converter(
    strategy: &ConverterStrategy,
    http_client: reqwest::Client,
) -> Box<dyn ImageConverter> {
    match strategy {
        ConverterStrategy::Local { quality } => {
            tracing::info!("WebP converter: local (quality {})", quality);
            Box::new(BestEffortConverter::new(LocalWebpConverter::new(
                http_client,
                *quality,
            )))
        }
        ConverterStrategy::Remote { endpoint } => {
            tracing::info!("WebP converter: remote ({})", endpoint);
            Box::new(BestEffortConverter::new(RemoteWebpConverter::new(
                http_client,
                endpoint.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_strategy_is_converted() {
        let converter = BestEffortConverter::new(MockConversionStrategy::new());
        let original = ImageReference::new("https://img.test/hero.png");

        let outcome = converter.convert(&original).await;
        assert!(outcome.is_converted());
        assert_eq!(outcome.reference().as_str(), "https://img.test/hero.png.webp");
    }

    #[tokio::test]
    async fn test_failing_strategy_falls_back_to_original() {
        let converter = BestEffortConverter::new(MockConversionStrategy::new().with_failure(true));
        let original = ImageReference::new("https://img.test/hero.png");

        let outcome = converter.convert(&original).await;
        assert_eq!(outcome, ConversionOutcome::Fallback(original.clone()));
        assert_eq!(outcome.into_reference(), original);
    }

    #[tokio::test]
    async fn test_empty_conversion_falls_back_to_original() {
        let converter =
            BestEffortConverter::new(MockConversionStrategy::new().with_empty_result(true));
        let original = ImageReference::new("https://img.test/hero.png");

        let outcome = converter.convert(&original).await;
        assert!(!outcome.is_converted());
        assert_eq!(outcome.reference(), &original);
    }

    #[tokio::test]
    async fn test_local_converter_falls_back_on_garbage() {
        let converter = build_converter(&ConverterStrategy::default(), reqwest::Client::new());
        let original = ImageReference::from_bytes("image/png", b"garbage");

        let outcome = converter.convert(&original).await;
        assert_eq!(outcome, ConversionOutcome::Fallback(original));
    }

    #[tokio::test]
    async fn test_remote_converter_falls_back_when_endpoint_is_unreachable() {
        let converter = build_converter(
            &ConverterStrategy::Remote {
                endpoint: "http://127.0.0.1:9/convert-file".to_string(),
            },
            reqwest::Client::new(),
        );
        let original = ImageReference::from_bytes("image/png", b"bytes");

        let outcome = converter.convert(&original).await;
        assert_eq!(outcome.into_reference(), original);
    }
}
