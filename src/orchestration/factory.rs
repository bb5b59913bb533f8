//! Orchestrator factory
//!
//! Wires the registry, appender and resolver named by the configuration.

use crate::builder::BuilderSettings;
use crate::config::{Config, ConfigManager};
use crate::error::LaminaResult;
use crate::image::{Image, OciAppender};
use crate::orchestration::Orchestrator;
use crate::registry::{registry_auth_from_env, MemoryRegistry, OciRegistry, Registry};
use crate::resolver::PipResolver;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where images are pulled from and pushed to
#[derive(Debug, Clone)]
pub enum RegistryMode {
    /// Real OCI registries
    Remote,
    /// In-memory registry holding an empty synthetic image for each base
    DryRun { bases: Vec<String> },
}

fn registry_for(config: &Config, mode: &RegistryMode) -> LaminaResult<Arc<dyn Registry>> {
    match mode {
        RegistryMode::Remote => Ok(Arc::new(OciRegistry::new(
            registry_auth_from_env()?,
            config.registry.insecure.clone(),
        ))),
        RegistryMode::DryRun { bases } => {
            info!("Dry run: using in-memory registry");
            let registry = MemoryRegistry::new();
            for base in bases {
                registry.seed(base, &Image::scratch(base.as_str()));
            }
            Ok(Arc::new(registry))
        }
    }
}

/// Build an orchestrator from configuration
pub fn create_orchestrator(config: &Config, mode: RegistryMode) -> LaminaResult<Orchestrator> {
    let registry = registry_for(config, &mode)?;
    let settings = BuilderSettings {
        choice: config.build.strategy,
        app_prefix: config.build.app_prefix.clone(),
        work_root: config
            .build
            .work_dir
            .clone()
            .unwrap_or_else(ConfigManager::builds_dir),
        layout: config.python.layout(),
        resolver: Arc::new(PipResolver::new(
            config.python.pip.clone(),
            config.python.pip_args.clone(),
        )),
    };
    let timeout = match config.build.timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(
        Orchestrator::new(registry, Arc::new(OciAppender::default()), settings)
            .with_cache(
                config.cache.enabled,
                config.registry.cache_repository.clone(),
            )
            .with_timeout(timeout)
            .with_concurrency(config.build.concurrency),
    )
}
