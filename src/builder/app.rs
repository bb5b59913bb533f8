//! Passthrough application builder

use crate::builder::{BuilderStrategy, StrategyKind};
use crate::cache::LayerCache;
use crate::context::SourceContext;
use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::Image;
use crate::layer::{build_layer, LayerEntry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Copies every context file under a fixed prefix, without dependencies
pub struct AppBuilder {
    context: Arc<dyn SourceContext>,
    prefix: String,
}

impl AppBuilder {
    pub fn new(context: Arc<dyn SourceContext>, prefix: impl Into<String>) -> Self {
        Self {
            context,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn context(&self) -> &dyn SourceContext {
        self.context.as_ref()
    }

    /// Layer entries for the context, in listing order
    pub fn entries(&self) -> LaminaResult<Vec<LayerEntry>> {
        let files = self.context.list_files()?;
        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let data = self.context.get_file(&path)?;
            let target = if self.prefix.is_empty() {
                path
            } else {
                format!("{}/{}", self.prefix, path)
            };
            entries.push(LayerEntry::file(target, data));
        }
        Ok(entries)
    }

    pub(crate) fn passthrough_layer(&self) -> LaminaResult<Vec<u8>> {
        let entries = self.entries()?;
        debug!("Packaging {} application file(s)", entries.len());
        build_layer(&entries)
    }
}

#[async_trait]
impl BuilderStrategy for AppBuilder {
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
        self.passthrough_layer()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::App
    }
}
