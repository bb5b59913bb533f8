//! Image values and layer appending
//!
//! An `Image` is an immutable stack of layers plus its config blob. It is
//! never mutated in place: appending a layer always produces a new value.

mod appender;

pub use appender::{ImageAppender, OciAppender};

use crate::error::{LaminaError, LaminaResult};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Media type for layers produced by lamina
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// Media type of the image config blob
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// Compute the `sha256:<hex>` digest of a blob
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// One layer blob of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayer {
    /// Digest of the compressed blob
    pub digest: String,
    /// Blob media type
    pub media_type: String,
    /// Compressed blob
    pub data: Arc<Vec<u8>>,
}

impl ImageLayer {
    /// Wrap a compressed blob, computing its digest
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            digest: sha256_digest(&data),
            media_type: media_type.into(),
            data: Arc::new(data),
        }
    }

    /// Size of the compressed blob in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// An image: config blob plus layers ordered bottom to top
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Where the image was pulled from or pushed to
    pub name: String,
    /// Raw image config JSON
    pub config: Arc<Vec<u8>>,
    /// Layers, base first
    pub layers: Vec<ImageLayer>,
}

impl Image {
    /// Build an image from its parts
    pub fn new(name: impl Into<String>, config: Vec<u8>, layers: Vec<ImageLayer>) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            layers,
        }
    }

    /// An image with no layers and a minimal linux/amd64 config
    pub fn scratch(name: impl Into<String>) -> Self {
        let config = serde_json::json!({
            "architecture": "amd64",
            "os": "linux",
            "config": {},
            "rootfs": { "type": "layers", "diff_ids": [] },
            "history": []
        });
        // Serializing a literal JSON value cannot fail.
        let bytes = serde_json::to_vec(&config).unwrap_or_default();
        Self::new(name, bytes, Vec::new())
    }

    /// Content identity of the image: the digest of its config blob.
    ///
    /// The config lists every layer's diff-id, so two images share an
    /// identity exactly when they have the same layer stack and settings.
    pub fn identity(&self) -> String {
        sha256_digest(&self.config)
    }

    /// Same image content under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Arc::clone(&self.config),
            layers: self.layers.clone(),
        }
    }

    /// Parse the config blob
    pub fn config_json(&self) -> LaminaResult<serde_json::Value> {
        serde_json::from_slice(&self.config)
            .map_err(|e| LaminaError::ImageConfig(format!("{}: {}", self.name, e)))
    }

    /// Layer diff-ids recorded in the config
    pub fn diff_ids(&self) -> LaminaResult<Vec<String>> {
        let config = self.config_json()?;
        Ok(config
            .pointer("/rootfs/diff_ids")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}
