//! Dependency layer cache
//!
//! Content-addressed storage for dependency images. Keys are derived from
//! the base image identity, an ecosystem namespace and the descriptor
//! checksum; see [`key`] for the exact mapping to a registry tag.
//!
//! # Outcomes
//!
//! | Call | Result | Meaning |
//! |------|--------|---------|
//! | `get` | `Ok(Some(image))` | Hit, usable as a base for further layers |
//! | `get` | `Ok(None)` | Miss, a normal outcome |
//! | `get`/`store` | `Err(RegistryTransport)` | Network or auth failure |
//!
//! Entries are immutable once stored. Concurrent stores of one key are
//! tolerated because the stored bytes are identical.

pub mod key;
pub mod registry;

pub use key::{validate_namespace, CacheKey, Checksum, PYTHON_NAMESPACE};
pub use registry::RegistryCache;

use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::{Image, ImageAppender};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Storage for dependency images keyed by (base, namespace, checksum)
#[async_trait]
pub trait LayerCache: Send + Sync {
    /// Look up the dependency image for a key
    async fn get(
        &self,
        base: &Image,
        namespace: &str,
        checksum: &Checksum,
        deadline: Deadline,
    ) -> LaminaResult<Option<Image>>;

    /// Append `layer` to `base`, persist the result under the key and
    /// return it. Only fully built layers may be passed here.
    async fn store(
        &self,
        base: &Image,
        namespace: &str,
        checksum: &Checksum,
        layer: &[u8],
        deadline: Deadline,
    ) -> LaminaResult<Image>;
}

/// Cache that never hits and never persists (`--no-cache`)
pub struct DisabledCache {
    appender: Arc<dyn ImageAppender>,
}

impl DisabledCache {
    /// Create a disabled cache that still appends layers on store
    pub fn new(appender: Arc<dyn ImageAppender>) -> Self {
        Self { appender }
    }
}

#[async_trait]
impl LayerCache for DisabledCache {
    async fn get(
        &self,
        _base: &Image,
        namespace: &str,
        _checksum: &Checksum,
        _deadline: Deadline,
    ) -> LaminaResult<Option<Image>> {
        debug!("Cache disabled, skipping {} lookup", namespace);
        Ok(None)
    }

    async fn store(
        &self,
        base: &Image,
        _namespace: &str,
        _checksum: &Checksum,
        layer: &[u8],
        _deadline: Deadline,
    ) -> LaminaResult<Image> {
        self.appender.append(base, layer)
    }
}
