//! Image acquisition for recipe articles.
//!
//! Derives per-slot image prompts from article text, generates each image
//! with a configured provider and re-encodes it to WebP on a best-effort
//! basis. Also ships the standalone WebP conversion service that the
//! remote conversion strategy talks to.

pub mod acquisition;
pub mod ai;
pub mod error;
pub mod html;
pub mod image;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod server;

pub use acquisition::{
    AcquirerServices, AcquisitionHooks, AcquisitionOutcome, AcquisitionRequest, ImageAcquirer,
    NoopHooks,
};
pub use error::{Error, Result};
pub use registry::{AcquisitionRegistry, Registration};
