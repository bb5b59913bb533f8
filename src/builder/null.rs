//! Builder that adds nothing

use crate::builder::{BuilderStrategy, StrategyKind};
use crate::cache::LayerCache;
use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::Image;
use crate::layer::build_layer;
use async_trait::async_trait;
use tracing::warn;

/// Strategy for contexts that should not be packaged
#[derive(Debug, Default)]
pub struct NullBuilder;

#[async_trait]
impl BuilderStrategy for NullBuilder {
    async fn open(&mut self) -> LaminaResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> LaminaResult<()> {
        Ok(())
    }

    async fn create_package_base(
        &self,
        base: &Image,
        _cache: &dyn LayerCache,
        _deadline: Deadline,
    ) -> LaminaResult<Image> {
        Ok(base.clone())
    }

    fn build_app_layer(&self) -> LaminaResult<Vec<u8>> {
        warn!("Null builder selected, application layer is empty");
        build_layer(&[])
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Null
    }
}
