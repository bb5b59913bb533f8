//! Image registry abstraction
//!
//! The cache and the orchestrator only need two operations from a registry:
//! push an image to a location and pull one if it exists. Authentication and
//! transport settings are fixed when a backend is constructed.

mod memory;
mod oci;

pub use memory::MemoryRegistry;
pub use oci::{registry_auth_from_env, OciRegistry};

use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::image::Image;
use async_trait::async_trait;

/// Registry operations used by the build
#[async_trait]
pub trait Registry: Send + Sync {
    /// Push `image` to `location`, returning the image named after it
    async fn push(&self, location: &str, image: &Image, deadline: Deadline) -> LaminaResult<Image>;

    /// Pull the image at `location`, or `None` when nothing is stored there
    async fn pull_if_exists(&self, location: &str, deadline: Deadline)
        -> LaminaResult<Option<Image>>;

    /// Human-readable backend name for display
    fn registry_name(&self) -> &'static str;
}

/// Strip the tag or digest from an image reference, keeping the repository
pub fn repository_of(reference: &str) -> LaminaResult<String> {
    if reference.is_empty() {
        return Err(LaminaError::InvalidReference {
            reference: reference.to_string(),
            reason: "empty reference".to_string(),
        });
    }

    let without_digest = reference.split('@').next().unwrap_or(reference);
    let name_start = without_digest.rfind('/').map_or(0, |i| i + 1);
    let repository = match without_digest[name_start..].rfind(':') {
        Some(colon) => &without_digest[..name_start + colon],
        None => without_digest,
    };

    if repository.is_empty() || repository.ends_with('/') {
        return Err(LaminaError::InvalidReference {
            reference: reference.to_string(),
            reason: "missing repository name".to_string(),
        });
    }
    Ok(repository.to_string())
}
