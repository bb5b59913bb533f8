//! Build command - build one image and push it

use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::LaminaResult;
use crate::orchestration::{create_orchestrator, BuildOutcome, BuildRequest, RegistryMode};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> LaminaResult<()> {
    let ctx = UiContext::detect();

    let mode = if args.dry_run {
        RegistryMode::DryRun {
            bases: vec![args.base.clone()],
        }
    } else {
        RegistryMode::Remote
    };
    let orchestrator = create_orchestrator(config, mode)?;

    let mut request = BuildRequest::new(args.base, args.name, args.directory);
    request.strategy = args.strategy;
    request.no_cache = args.no_cache;
    request.cache_repository = args.cache_repo;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Building {}", request.target));

    match orchestrator.build(&request).await {
        Ok(outcome) => {
            let verb = if args.dry_run { "Built" } else { "Pushed" };
            spinner.stop(&format!("{} {}", verb, outcome.image.name));
            print_outcome(&ctx, &outcome);
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Build of {} failed", request.target));
            Err(e)
        }
    }
}

/// Print the strategy, image identity and ordered layer list
pub(crate) fn print_outcome(ctx: &UiContext, outcome: &BuildOutcome) {
    ui::key_value(ctx, "strategy", outcome.strategy.as_str());
    ui::key_value(ctx, "image", &outcome.image.identity());
    ui::key_value(ctx, "layers", &outcome.image.layers.len().to_string());
    for (index, layer) in outcome.image.layers.iter().enumerate() {
        ui::remark(
            ctx,
            &format!("{:>3}. {}  {}", index + 1, layer.digest, format_size(layer.size())),
        );
    }
}

/// Human-readable byte count
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
