//! Node builder
//!
//! Detected from `package.json`. Dependency installation is not available
//! for Node, so `create_package_base` reports the ecosystem as unsupported
//! instead of silently producing an image without `node_modules`.

use crate::builder::{AppBuilder, BuilderStrategy, StrategyKind};
use crate::cache::LayerCache;
use crate::context::SourceContext;
use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::image::Image;
use async_trait::async_trait;
use std::sync::Arc;

pub struct NodeBuilder {
    app: AppBuilder,
}

impl NodeBuilder {
    pub fn new(context: Arc<dyn SourceContext>, prefix: impl Into<String>) -> Self {
        Self {
            app: AppBuilder::new(context, prefix),
        }
    }
}

#[async_trait]
impl BuilderStrategy for NodeBuilder {
    async fn open(&mut self) -> LaminaResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> LaminaResult<()> {
        Ok(())
    }

    async fn create_package_base(
        &self,
        _base: &Image,
        _cache: &dyn LayerCache,
        _deadline: Deadline,
    ) -> LaminaResult<Image> {
        Err(LaminaError::UnsupportedEcosystem(
            "node (package.json)".to_string(),
        ))
    }

    fn build_app_layer(&self) -> LaminaResult<Vec<u8>> {
        self.app.passthrough_layer()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Node
    }
}
