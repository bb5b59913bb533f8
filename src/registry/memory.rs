//! In-process registry
//!
//! Keeps pushed images in a map keyed by location. Used for dry runs, where
//! nothing may leave the machine, and as a test double.

use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::Image;
use crate::registry::Registry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Registry held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    images: Mutex<HashMap<String, Image>>,
    pushes: AtomicUsize,
    pulls: AtomicUsize,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` at `location` without counting it as a push
    pub fn seed(&self, location: &str, image: &Image) {
        self.lock().insert(location.to_string(), image.renamed(location));
    }

    /// Locations currently holding an image, sorted
    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = self.lock().keys().cloned().collect();
        locations.sort();
        locations
    }

    /// Number of pushes served
    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    /// Number of pulls served (hits and misses)
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Image>> {
        // A poisoned map still holds consistent images: inserts are atomic.
        self.images
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn push(&self, location: &str, image: &Image, _deadline: Deadline) -> LaminaResult<Image> {
        let pushed = image.renamed(location);
        self.lock().insert(location.to_string(), pushed.clone());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        debug!("Stored {} in memory registry", location);
        Ok(pushed)
    }

    async fn pull_if_exists(
        &self,
        location: &str,
        _deadline: Deadline,
    ) -> LaminaResult<Option<Image>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().get(location).cloned())
    }

    fn registry_name(&self) -> &'static str {
        "memory"
    }
}
