//! Builder strategies
//!
//! A strategy turns a source context into two things: a package base (the
//! base image plus an optional, cached dependency layer) and an application
//! layer. The set of strategies is closed, so [`Builder`] is an enum and
//! dispatch is a `match`.
//!
//! Lifecycle: `open` → `create_package_base` → `build_app_layer` → `close`.
//! `close` must be called even when an earlier step fails.

mod app;
pub mod factory;
mod node;
mod null;
mod python;
pub mod scripts;
pub mod workdir;

pub use app::AppBuilder;
pub use factory::{
    detect_strategy, from_context, marker_for, select_strategy, BuilderSettings, StrategyChoice,
};
pub use node::NodeBuilder;
pub use null::NullBuilder;
pub use python::PythonBuilder;
pub use workdir::WorkDir;

use crate::cache::LayerCache;
use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::Image;
use async_trait::async_trait;
use std::fmt;

/// Operations every builder strategy provides
#[async_trait]
pub trait BuilderStrategy: Send + Sync {
    /// Acquire scoped resources such as a work directory
    async fn open(&mut self) -> LaminaResult<()>;

    /// Release everything acquired in `open`. Safe to call more than once.
    async fn close(&mut self) -> LaminaResult<()>;

    /// Base image with dependencies installed, or `base` itself when the
    /// strategy has no dependencies to install
    async fn create_package_base(
        &self,
        base: &Image,
        cache: &dyn LayerCache,
        deadline: Deadline,
    ) -> LaminaResult<Image>;

    /// Gzip-compressed tar of the application files
    fn build_app_layer(&self) -> LaminaResult<Vec<u8>>;

    /// Strategy kind
    fn kind(&self) -> StrategyKind;
}

/// Concrete strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Null,
    App,
    Python,
    Node,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::App => "app",
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selected builder
pub enum Builder {
    Null(NullBuilder),
    App(AppBuilder),
    Python(PythonBuilder),
    Node(NodeBuilder),
}

#[async_trait]
impl BuilderStrategy for Builder {
    async fn open(&mut self) -> LaminaResult<()> {
        match self {
            Self::Null(b) => b.open().await,
            Self::App(b) => b.open().await,
            Self::Python(b) => b.open().await,
            Self::Node(b) => b.open().await,
        }
    }

    async fn close(&mut self) -> LaminaResult<()> {
        match self {
            Self::Null(b) => b.close().await,
            Self::App(b) => b.close().await,
            Self::Python(b) => b.close().await,
            Self::Node(b) => b.close().await,
        }
    }

    async fn create_package_base(
        &self,
        base: &Image,
        cache: &dyn LayerCache,
        deadline: Deadline,
    ) -> LaminaResult<Image> {
        match self {
            Self::Null(b) => b.create_package_base(base, cache, deadline).await,
            Self::App(b) => b.create_package_base(base, cache, deadline).await,
            Self::Python(b) => b.create_package_base(base, cache, deadline).await,
            Self::Node(b) => b.create_package_base(base, cache, deadline).await,
        }
    }

    fn build_app_layer(&self) -> LaminaResult<Vec<u8>> {
        match self {
            Self::Null(b) => b.build_app_layer(),
            Self::App(b) => b.build_app_layer(),
            Self::Python(b) => b.build_app_layer(),
            Self::Node(b) => b.build_app_layer(),
        }
    }

    fn kind(&self) -> StrategyKind {
        match self {
            Self::Null(_) => StrategyKind::Null,
            Self::App(_) => StrategyKind::App,
            Self::Python(_) => StrategyKind::Python,
            Self::Node(_) => StrategyKind::Node,
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Builder").field(&self.kind()).finish()
    }
}
