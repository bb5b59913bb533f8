//! Appending layers to images

use crate::error::{LaminaError, LaminaResult};
use crate::image::{sha256_digest, Image, ImageLayer, LAYER_MEDIA_TYPE};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io;
use tracing::debug;

/// Produces a new image with one more layer on top of `base`
pub trait ImageAppender: Send + Sync {
    /// Append a gzip compressed tar layer to `base`
    fn append(&self, base: &Image, layer: &[u8]) -> LaminaResult<Image>;
}

/// Appender that records the layer in the OCI image config
///
/// The layer's diff-id (digest of the uncompressed tar) is added to
/// `rootfs.diff_ids` and a history entry without a timestamp is recorded,
/// so appending the same bytes to the same base always yields the same
/// config and therefore the same image identity.
#[derive(Debug, Clone)]
pub struct OciAppender {
    created_by: String,
}

impl OciAppender {
    /// Create an appender whose history entries carry `created_by`
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
        }
    }
}

impl Default for OciAppender {
    fn default() -> Self {
        Self::new(concat!("lamina ", env!("CARGO_PKG_VERSION")))
    }
}

/// Digest of the decompressed layer contents
fn diff_id(layer: &[u8]) -> LaminaResult<String> {
    let mut decoder = GzDecoder::new(layer);
    let mut hasher = Sha256::new();
    io::copy(&mut decoder, &mut hasher)
        .map_err(|e| LaminaError::io("decompressing layer for diff-id", e))?;
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

impl ImageAppender for OciAppender {
    fn append(&self, base: &Image, layer: &[u8]) -> LaminaResult<Image> {
        let diff_id = diff_id(layer)?;
        let mut config = base.config_json()?;

        let root = config
            .as_object_mut()
            .ok_or_else(|| LaminaError::ImageConfig(format!("{}: not an object", base.name)))?;

        let rootfs = root
            .entry("rootfs")
            .or_insert_with(|| json!({ "type": "layers", "diff_ids": [] }));
        if !rootfs.is_object() {
            *rootfs = json!({ "type": "layers", "diff_ids": [] });
        }
        match rootfs.get_mut("diff_ids").and_then(Value::as_array_mut) {
            Some(ids) => ids.push(Value::String(diff_id.clone())),
            None => {
                rootfs["type"] = json!("layers");
                rootfs["diff_ids"] = json!([diff_id.clone()]);
            }
        }

        let history = root.entry("history").or_insert_with(|| json!([]));
        if let Some(entries) = history.as_array_mut() {
            entries.push(json!({ "created_by": self.created_by }));
        }

        let mut layers = base.layers.clone();
        layers.push(ImageLayer::new(layer.to_vec(), LAYER_MEDIA_TYPE));

        let image = Image::new(base.name.clone(), serde_json::to_vec(&config)?, layers);
        debug!(
            "Appended layer {} (diff {}) onto {}",
            sha256_digest(layer),
            diff_id,
            base.name
        );
        Ok(image)
    }
}
