//! Build orchestration
//!
//! Drives one build through the builder lifecycle:
//!
//! 1. open the build directory and select a strategy
//! 2. pull the base image
//! 3. create (or restore from cache) the package base
//! 4. append the application layer and push the result
//!
//! Builds are independent and run concurrently through a bounded pool;
//! the only shared state is the registry behind `Arc<dyn Registry>`.

mod factory;

pub use factory::{create_orchestrator, RegistryMode};

use crate::builder::{self, Builder, BuilderSettings, BuilderStrategy, StrategyChoice, StrategyKind};
use crate::cache::{DisabledCache, LayerCache, RegistryCache};
use crate::context::{SourceContext, Workspace};
use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::image::{Image, ImageAppender};
use crate::registry::{repository_of, Registry};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One image to build
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRequest {
    /// Base image reference
    pub base: String,
    /// Reference the result is pushed to
    #[serde(alias = "name")]
    pub target: String,
    /// Application source directory
    pub directory: PathBuf,
    /// Strategy override for this build
    #[serde(default)]
    pub strategy: Option<StrategyChoice>,
    /// Skip the dependency cache
    #[serde(default)]
    pub no_cache: bool,
    /// Cache repository override for this build
    #[serde(default)]
    pub cache_repository: Option<String>,
}

impl BuildRequest {
    pub fn new(
        base: impl Into<String>,
        target: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base: base.into(),
            target: target.into(),
            directory: directory.into(),
            strategy: None,
            no_cache: false,
            cache_repository: None,
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Strategy that produced the image
    pub strategy: StrategyKind,
    /// Pushed image
    pub image: Image,
}

/// Runs builds against shared registry, appender and settings
pub struct Orchestrator {
    registry: Arc<dyn Registry>,
    appender: Arc<dyn ImageAppender>,
    settings: BuilderSettings,
    cache_enabled: bool,
    cache_repository: Option<String>,
    timeout: Option<Duration>,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn Registry>,
        appender: Arc<dyn ImageAppender>,
        settings: BuilderSettings,
    ) -> Self {
        Self {
            registry,
            appender,
            settings,
            cache_enabled: true,
            cache_repository: None,
            timeout: None,
            concurrency: 1,
        }
    }

    /// Enable or disable the dependency cache for every build
    pub fn with_cache(mut self, enabled: bool, repository: Option<String>) -> Self {
        self.cache_enabled = enabled;
        self.cache_repository = repository;
        self
    }

    /// Bound each build's collaborator calls by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum builds running at once in `build_all`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    fn deadline(&self) -> Deadline {
        match self.timeout {
            Some(timeout) => Deadline::after(timeout),
            None => Deadline::none(),
        }
    }

    fn cache_for(&self, request: &BuildRequest) -> LaminaResult<Box<dyn LayerCache>> {
        if request.no_cache || !self.cache_enabled {
            debug!("Dependency cache disabled for {}", request.target);
            return Ok(Box::new(DisabledCache::new(self.appender.clone())));
        }
        let repository = match request
            .cache_repository
            .as_ref()
            .or(self.cache_repository.as_ref())
        {
            Some(repository) => repository.clone(),
            None => repository_of(&request.target)?,
        };
        let cache = RegistryCache::new(repository, self.registry.clone(), self.appender.clone());
        debug!("Dependency cache for {} in {}", request.target, cache.repository());
        Ok(Box::new(cache))
    }

    /// Build one image and push it to `request.target`
    pub async fn build(&self, request: &BuildRequest) -> LaminaResult<BuildOutcome> {
        let context: Arc<dyn SourceContext> = Arc::new(Workspace::open(&request.directory)?);
        let mut settings = self.settings.clone();
        if let Some(choice) = request.strategy {
            settings.choice = choice;
        }
        let mut builder = builder::from_context(context, &settings)?;
        let deadline = self.deadline();

        builder.open().await?;
        let mut builder = Arc::new(builder);
        let result = self.run(&builder, request, deadline).await;
        // Layer tasks have finished by now, so the builder is no longer shared.
        let closed = match Arc::get_mut(&mut builder) {
            Some(builder) => builder.close().await,
            None => Err(LaminaError::Internal(
                "builder still in use at close".to_string(),
            )),
        };
        if let Err(e) = &closed {
            warn!(
                "Failed to release build resources for {}: {}",
                request.target, e
            );
        }

        let image = result?;
        Ok(BuildOutcome {
            strategy: builder.kind(),
            image,
        })
    }

    async fn run(
        &self,
        builder: &Arc<Builder>,
        request: &BuildRequest,
        deadline: Deadline,
    ) -> LaminaResult<Image> {
        info!("Pulling base image {}", request.base);
        let base = self
            .registry
            .pull_if_exists(&request.base, deadline)
            .await?
            .ok_or_else(|| LaminaError::ImageNotFound(request.base.clone()))?;

        let cache = self.cache_for(request)?;
        let package_base = builder
            .create_package_base(&base, cache.as_ref(), deadline)
            .await?;

        let layer_builder = Arc::clone(builder);
        let app_layer = tokio::task::spawn_blocking(move || layer_builder.build_app_layer())
            .await
            .map_err(|e| LaminaError::Internal(format!("app layer task failed: {}", e)))??;

        let appender = Arc::clone(&self.appender);
        let image = tokio::task::spawn_blocking(move || appender.append(&package_base, &app_layer))
            .await
            .map_err(|e| LaminaError::Internal(format!("append task failed: {}", e)))??;

        info!("Pushing {}", request.target);
        self.registry.push(&request.target, &image, deadline).await
    }

    /// Run `requests` through the bounded pool; results keep request order
    pub async fn build_all(&self, requests: &[BuildRequest]) -> Vec<LaminaResult<BuildOutcome>> {
        info!(
            "Running {} build(s), {} at a time",
            requests.len(),
            self.concurrency
        );
        stream::iter(requests)
            .map(|request| self.build(request))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
