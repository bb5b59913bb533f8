//! Error types for Lamina
//!
//! All modules use `LaminaResult<T>` as their return type. A cache miss is
//! not an error: lookups return `Ok(None)`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Lamina operations
pub type LaminaResult<T> = Result<T, LaminaError>;

/// All errors that can occur in Lamina
#[derive(Error, Debug)]
pub enum LaminaError {
    // Ecosystem errors
    #[error("Unsupported ecosystem: {0} has no dependency install path")]
    UnsupportedEcosystem(String),

    #[error("Package resolution failed ({tool}): {reason}")]
    ResolverFailure { tool: String, reason: String },

    #[error("Malformed {descriptor}: {reason}")]
    MalformedDescriptor { descriptor: String, reason: String },

    #[error("Invalid package artifact {path}: {reason}")]
    Wheel { path: PathBuf, reason: String },

    // Registry errors
    #[error("Registry error at {location}: {reason}")]
    RegistryTransport { location: String, reason: String },

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Invalid image reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Invalid image config: {0}")]
    ImageConfig(String),

    // Control flow
    #[error("Timed out: {operation}")]
    Timeout { operation: String },

    #[error("Build cancelled")]
    Cancelled,

    // Source context errors
    #[error("File not found in source context: {0}")]
    FileNotFound(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl LaminaError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a registry transport error
    pub fn registry(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::RegistryTransport {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistryTransport { .. } | Self::Timeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedEcosystem(_) => {
                Some("Use --strategy app to package the sources without dependencies")
            }
            Self::RegistryTransport { .. } => {
                Some("Check LAMINA_REGISTRY_USERNAME/LAMINA_REGISTRY_PASSWORD and registry reachability")
            }
            Self::Timeout { .. } => Some("Raise build.timeout_secs in the config"),
            Self::MalformedDescriptor { .. } => Some("Fix the dependency manifest and rebuild"),
            _ => None,
        }
    }
}
