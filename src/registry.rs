//! Process-wide lookup for acquirers.
//!
//! Lets an outer layer start an acquisition by name without holding a
//! reference to the acquirer. Each [`Registration`] is scoped: dropping it
//! removes the entry, unless a newer registration under the same name has
//! already replaced it.

use crate::acquisition::{AcquisitionOutcome, AcquisitionRequest, ImageAcquirer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::debug;

/// Name the CLI registers its acquirer under.
pub const GENERATE_IMAGES: &str = "generate_blog_images";

struct Entry {
    id: u64,
    acquirer: Arc<ImageAcquirer>,
}

#[derive(Clone, Default)]
pub struct AcquisitionRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    next_id: Arc<AtomicU64>,
}

impl AcquisitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static AcquisitionRegistry {
        static GLOBAL: OnceLock<AcquisitionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(AcquisitionRegistry::new)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries stay consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `acquirer` under `name`, replacing any existing entry.
    pub fn register(&self, name: &str, acquirer: Arc<ImageAcquirer>) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .entries()
            .insert(name.to_string(), Entry { id, acquirer })
            .is_some();
        debug!("Registered acquirer '{}' (replaced existing: {})", name, replaced);

        Registration {
            registry: self.clone(),
            name: name.to_string(),
            id,
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    /// Run an acquisition on the acquirer registered under `name`.
    /// `None` when nothing is registered.
    pub async fn trigger(
        &self,
        name: &str,
        request: AcquisitionRequest,
    ) -> Option<AcquisitionOutcome> {
        let acquirer = self.entries().get(name).map(|entry| entry.acquirer.clone());

        match acquirer {
            Some(acquirer) => Some(acquirer.acquire(request).await),
            None => {
                debug!("No acquirer registered as '{}'", name);
                None
            }
        }
    }

    fn release(&self, name: &str, id: u64) {
        let mut entries = self.entries();
        if entries.get(name).is_some_and(|entry| entry.id == id) {
            entries.remove(name);
            debug!("Deregistered acquirer '{}'", name);
        }
    }
}

#[must_use = "dropping a Registration deregisters the acquirer"]
pub struct Registration {
    registry: AcquisitionRegistry,
    name: String,
    id: u64,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.name, self.id);
    }
}
