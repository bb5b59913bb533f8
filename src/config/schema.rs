//! Configuration schema for Lamina
//!
//! Configuration is stored at `~/.config/lamina/config.toml`

use crate::builder::StrategyChoice;
use crate::resolver::wheel::InstallLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Registry settings
    pub registry: RegistryConfig,

    /// Dependency cache settings
    pub cache: CacheConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Python ecosystem settings
    pub python: PythonConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Registry settings
///
/// Credentials are read from `LAMINA_REGISTRY_USERNAME` and
/// `LAMINA_REGISTRY_PASSWORD`, never from this file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Repository holding cache tags (default: the target's repository)
    pub cache_repository: Option<String>,

    /// Registry hosts reached over plain HTTP
    pub insecure: Vec<String>,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable dependency caching (default: true)
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum builds running at once
    pub concurrency: usize,

    /// Deadline for the registry and resolver calls of one build (0 = none)
    pub timeout_secs: u64,

    /// Builder strategy
    pub strategy: StrategyChoice,

    /// Directory application files are placed under
    pub app_prefix: String,

    /// Parent of per-build work directories (default: state dir)
    pub work_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 1800,
            strategy: StrategyChoice::Auto,
            app_prefix: "app".to_string(),
            work_dir: None,
        }
    }
}

/// Python configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// pip executable
    pub pip: String,

    /// Extra arguments passed to `pip wheel`
    pub pip_args: Vec<String>,

    /// Library directory inside the image
    pub site_packages: String,

    /// Script directory inside the image
    pub bin_dir: String,

    /// Interpreter written into script shebangs
    pub interpreter: String,
}

impl Default for PythonConfig {
    fn default() -> Self {
        let layout = InstallLayout::default();
        Self {
            pip: "pip3".to_string(),
            pip_args: Vec::new(),
            site_packages: layout.site_packages,
            bin_dir: layout.bin_dir,
            interpreter: layout.interpreter,
        }
    }
}

impl PythonConfig {
    /// Where wheel contents land inside the image
    pub fn layout(&self) -> InstallLayout {
        InstallLayout {
            site_packages: self.site_packages.trim_matches('/').to_string(),
            bin_dir: self.bin_dir.trim_matches('/').to_string(),
            interpreter: self.interpreter.clone(),
        }
    }
}
