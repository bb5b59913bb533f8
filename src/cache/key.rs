//! Content-addressed cache keys
//!
//! A dependency image is identified by the base image it was built on, the
//! ecosystem namespace that built it, and the checksum of the dependency
//! descriptor. The triple maps to exactly one registry tag.

use crate::error::{LaminaError, LaminaResult};
use sha2::{Digest, Sha256};
use std::fmt;

/// Namespace for Python `requirements.txt` dependency layers
pub const PYTHON_NAMESPACE: &str = "python-requirements-cache";

/// Longest namespace accepted, leaving room for the hash in a 128 char tag
const MAX_NAMESPACE_LEN: usize = 48;

/// SHA256 of a dependency descriptor, as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Checksum the raw descriptor bytes
    pub fn of(descriptor: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(descriptor)))
    }

    /// Hex form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a cache namespace.
///
/// Namespaces end up in registry tags, so they are limited to lowercase
/// alphanumerics and dashes.
pub fn validate_namespace(namespace: &str) -> LaminaResult<()> {
    let valid = !namespace.is_empty()
        && namespace.len() <= MAX_NAMESPACE_LEN
        && namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !namespace.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(LaminaError::Internal(format!(
            "invalid cache namespace: {:?}",
            namespace
        )))
    }
}

/// (base image identity, namespace, checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Identity of the base image (its config digest)
    pub base_identity: String,
    /// Ecosystem namespace
    pub namespace: String,
    /// Descriptor checksum
    pub checksum: Checksum,
}

impl CacheKey {
    /// Create a key, validating the namespace
    pub fn new(
        base_identity: impl Into<String>,
        namespace: &str,
        checksum: Checksum,
    ) -> LaminaResult<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            base_identity: base_identity.into(),
            namespace: namespace.to_string(),
            checksum,
        })
    }

    /// Registry tag for this key: `<namespace>-<sha256 of all components>`
    pub fn tag(&self) -> String {
        let mut hasher = Sha256::new();
        // Components are length-prefixed so no two triples share an encoding.
        for part in [
            self.base_identity.as_str(),
            self.namespace.as_str(),
            self.checksum.as_str(),
        ] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{}-{}", self.namespace, hex::encode(hasher.finalize()))
    }

    /// Full registry location of this key inside `repository`
    pub fn location(&self, repository: &str) -> String {
        format!("{}:{}", repository, self.tag())
    }
}
