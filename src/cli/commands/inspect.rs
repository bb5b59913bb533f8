//! Inspect command - show how a directory would be built
//!
//! Everything here is computed locally: strategy selection, the descriptor
//! checksum and the cache namespace. No registry is contacted, so the cache
//! tag itself (which depends on the base image identity) is not shown.

use crate::builder::{marker_for, select_strategy, StrategyChoice, StrategyKind};
use crate::cache::{Checksum, PYTHON_NAMESPACE};
use crate::cli::args::{InspectArgs, OutputFormat};
use crate::config::Config;
use crate::context::{SourceContext, Workspace};
use crate::error::LaminaResult;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Inspection {
    directory: String,
    strategy: String,
    files: usize,
    descriptor: Option<String>,
    namespace: Option<String>,
    checksum: Option<String>,
}

fn inspect(workspace: &Workspace, choice: StrategyChoice) -> LaminaResult<Inspection> {
    let kind = select_strategy(choice, workspace);
    let files = workspace.list_files()?.len();

    let descriptor = marker_for(kind).filter(|marker| workspace.contains(marker));
    let checksum = match descriptor {
        Some(marker) => Some(Checksum::of(&workspace.get_file(marker)?).to_string()),
        None => None,
    };
    let namespace = match kind {
        StrategyKind::Python => Some(PYTHON_NAMESPACE.to_string()),
        _ => None,
    };

    Ok(Inspection {
        directory: workspace.root().display().to_string(),
        strategy: kind.to_string(),
        files,
        descriptor: descriptor.map(str::to_string),
        namespace,
        checksum,
    })
}

/// Execute the inspect command
pub async fn execute(args: InspectArgs, config: &Config) -> LaminaResult<()> {
    let workspace = Workspace::open(&args.directory)?;
    let inspection = inspect(&workspace, config.build.strategy)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&inspection)?),
        OutputFormat::Text => {
            let ctx = UiContext::detect();
            ui::key_value(&ctx, "directory", &inspection.directory);
            ui::key_value(&ctx, "strategy", &inspection.strategy);
            ui::key_value(&ctx, "files", &inspection.files.to_string());
            if let Some(descriptor) = &inspection.descriptor {
                ui::key_value(&ctx, "descriptor", descriptor);
            }
            match &inspection.namespace {
                Some(namespace) => ui::key_value(&ctx, "cache namespace", namespace),
                None if inspection.strategy == StrategyKind::Node.as_str() => {
                    ui::step_warn(&ctx, "Node dependency installation is not supported")
                }
                None => ui::remark(&ctx, "No dependency layer"),
            }
            if let Some(checksum) = &inspection.checksum {
                ui::key_value(&ctx, "checksum", checksum);
            }
        }
    }
    Ok(())
}
