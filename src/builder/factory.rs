//! Builder selection
//!
//! Detection checks ecosystem markers in a fixed priority order. The first
//! marker present wins; a context with no marker gets the passthrough
//! application builder.

use crate::builder::{AppBuilder, Builder, NodeBuilder, NullBuilder, PythonBuilder, StrategyKind};
use crate::context::SourceContext;
use crate::error::{LaminaError, LaminaResult};
use crate::resolver::wheel::InstallLayout;
use crate::resolver::PackageResolver;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Ecosystem markers, highest priority first
pub const MARKERS: &[(&str, StrategyKind)] = &[
    ("requirements.txt", StrategyKind::Python),
    ("package.json", StrategyKind::Node),
];

/// Requested strategy, from config or `--strategy`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Detect from marker files
    #[default]
    Auto,
    /// Package nothing
    Null,
    /// Copy application files only
    App,
    /// Python dependencies plus application files
    Python,
    /// Node (dependency install unsupported)
    Node,
}

/// Everything a builder needs besides its context
#[derive(Clone)]
pub struct BuilderSettings {
    pub choice: StrategyChoice,
    pub app_prefix: String,
    /// Parent of per-build work directories
    pub work_root: PathBuf,
    pub layout: InstallLayout,
    pub resolver: Arc<dyn PackageResolver>,
}

/// Detect the strategy for a context
pub fn detect_strategy(context: &dyn SourceContext) -> StrategyKind {
    for (marker, kind) in MARKERS {
        if context.contains(marker) {
            debug!("Found {}, using {} builder", marker, kind);
            return *kind;
        }
    }
    StrategyKind::App
}

/// Descriptor file a strategy reads, if any
pub fn marker_for(kind: StrategyKind) -> Option<&'static str> {
    MARKERS
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(marker, _)| *marker)
}

/// Strategy for `choice`, detecting from markers when it is `Auto`
pub fn select_strategy(choice: StrategyChoice, context: &dyn SourceContext) -> StrategyKind {
    match choice {
        StrategyChoice::Auto => detect_strategy(context),
        StrategyChoice::Null => StrategyKind::Null,
        StrategyChoice::App => StrategyKind::App,
        StrategyChoice::Python => StrategyKind::Python,
        StrategyChoice::Node => StrategyKind::Node,
    }
}

/// Select and construct the builder bound to `context`
pub fn from_context(
    context: Arc<dyn SourceContext>,
    settings: &BuilderSettings,
) -> LaminaResult<Builder> {
    let kind = select_strategy(settings.choice, context.as_ref());

    if let Some(marker) = marker_for(kind) {
        if !context.contains(marker) {
            return Err(LaminaError::User(format!(
                "{} builder requires {} in the build directory",
                kind, marker
            )));
        }
    }

    info!("Using {} builder", kind);
    let builder = match kind {
        StrategyKind::Null => Builder::Null(NullBuilder),
        StrategyKind::App => Builder::App(AppBuilder::new(context, settings.app_prefix.clone())),
        StrategyKind::Python => Builder::Python(PythonBuilder::new(
            context,
            settings.app_prefix.clone(),
            settings.resolver.clone(),
            settings.layout.clone(),
            settings.work_root.clone(),
        )),
        StrategyKind::Node => {
            Builder::Node(NodeBuilder::new(context, settings.app_prefix.clone()))
        }
    };
    Ok(builder)
}
