//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("WebP conversion error: {0}")]
    Conversion(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
