//! Tar + gzip assembly with fixed metadata

use crate::error::{LaminaError, LaminaResult};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use tar::{Builder, EntryType, Header};

/// Permissions for regular files
pub const DEFAULT_MODE: u32 = 0o644;

/// Permissions for scripts and shims
pub const EXECUTABLE_MODE: u32 = 0o755;

/// One file in a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    /// Path inside the image, relative to `/`
    pub path: String,
    /// File contents
    pub data: Vec<u8>,
    /// Unix permission bits
    pub mode: u32,
}

impl LayerEntry {
    /// A regular file with default permissions
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            mode: DEFAULT_MODE,
        }
    }

    /// An executable file
    pub fn executable(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            mode: EXECUTABLE_MODE,
        }
    }

    /// Override the permission bits
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Serialize `entries`, in order, into a compressed layer blob.
///
/// Headers carry zero mtime/uid/gid and no owner names; the gzip header has
/// no filename and a zero timestamp. Compression level is fixed.
pub fn build_layer(entries: &[LayerEntry]) -> LaminaResult<Vec<u8>> {
    let encoder: GzEncoder<Vec<u8>> = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(Vec::new(), Compression::new(6));
    let mut builder = Builder::new(encoder);

    for entry in entries {
        let path = entry.path.trim_start_matches('/');
        if path.is_empty() {
            return Err(LaminaError::Internal(
                "layer entry with empty path".to_string(),
            ));
        }

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(entry.data.len() as u64);
        header.set_mode(entry.mode);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        builder
            .append_data(&mut header, path, entry.data.as_slice())
            .map_err(|e| LaminaError::io(format!("adding {} to layer", path), e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| LaminaError::io("finalizing layer archive", e))?;
    encoder
        .finish()
        .map_err(|e| LaminaError::io("compressing layer", e))
}
