use super::ConversionStrategy;
use crate::models::ImageReference;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Appends `.webp` to whatever it is given unless told to fail.
#[derive(Clone)]
pub struct MockConversionStrategy {
    convert_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
    empty_result: Arc<Mutex<bool>>,
    failing_references: Arc<Mutex<HashSet<String>>>,
}

impl MockConversionStrategy {
    pub fn new() -> Self {
        Self {
            convert_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            empty_result: Arc::new(Mutex::new(false)),
            failing_references: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn with_empty_result(self, empty: bool) -> Self {
        *self.empty_result.lock().unwrap() = empty;
        self
    }

    pub fn with_failure_for(self, reference: &str) -> Self {
        self.failing_references
            .lock()
            .unwrap()
            .insert(reference.to_string());
        self
    }

    pub fn get_convert_count(&self) -> usize {
        *self.convert_count.lock().unwrap()
    }

    /// The reference a successful mock conversion produces for `original`.
    pub fn converted_reference(original: &ImageReference) -> ImageReference {
        ImageReference::new(format!("{}.webp", original.as_str()))
    }
}

impl Default for MockConversionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionStrategy for MockConversionStrategy {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn try_convert(&self, reference: &ImageReference) -> Result<ImageReference> {
        *self.convert_count.lock().unwrap() += 1;

        let fails_for_reference = self
            .failing_references
            .lock()
            .unwrap()
            .contains(reference.as_str());
        if *self.should_fail.lock().unwrap() || fails_for_reference {
            return Err(Error::Conversion("Mock conversion failure".to_string()));
        }
        if *self.empty_result.lock().unwrap() {
            return Ok(ImageReference::new(""));
        }

        Ok(Self::converted_reference(reference))
    }
}
