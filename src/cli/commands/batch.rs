//! Batch command - run many builds through the worker pool

use crate::cli::args::BatchArgs;
use crate::config::Config;
use crate::error::{LaminaError, LaminaResult};
use crate::orchestration::{create_orchestrator, BuildRequest, RegistryMode};
use crate::ui::{self, TaskSpinner, UiContext};
use serde::Deserialize;
use std::path::Path;

/// Batch file layout: one `[[build]]` table per image
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default, rename = "build")]
    builds: Vec<BuildRequest>,
}

/// Parse a batch file, resolving relative directories against `base_dir`
fn parse_batch(content: &str, path: &Path, base_dir: &Path) -> LaminaResult<Vec<BuildRequest>> {
    let batch: BatchFile = toml::from_str(content).map_err(|e| LaminaError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if batch.builds.is_empty() {
        return Err(LaminaError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: "no [[build]] entries".to_string(),
        });
    }
    Ok(batch
        .builds
        .into_iter()
        .map(|mut request| {
            if request.directory.is_relative() {
                request.directory = base_dir.join(&request.directory);
            }
            request
        })
        .collect())
}

/// Execute the batch command
pub async fn execute(args: BatchArgs, config: &Config) -> LaminaResult<()> {
    let ctx = UiContext::detect();

    let content = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| LaminaError::io(format!("reading {}", args.file.display()), e))?;
    let base_dir = args.file.parent().unwrap_or_else(|| Path::new("."));
    let requests = parse_batch(&content, &args.file, base_dir)?;

    let mut config = config.clone();
    if let Some(jobs) = args.jobs {
        config.build.concurrency = jobs.max(1);
    }
    let mode = if args.dry_run {
        RegistryMode::DryRun {
            bases: requests.iter().map(|r| r.base.clone()).collect(),
        }
    } else {
        RegistryMode::Remote
    };
    let orchestrator = create_orchestrator(&config, mode)?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Building {} image(s), {} at a time",
        requests.len(),
        orchestrator.concurrency()
    ));
    let results = orchestrator.build_all(&requests).await;
    spinner.clear();

    let mut failed = 0;
    for (request, result) in requests.iter().zip(&results) {
        match result {
            Ok(outcome) => ui::step_ok_detail(
                &ctx,
                &request.target,
                &format!("{}, {} layer(s)", outcome.strategy, outcome.image.layers.len()),
            ),
            Err(e) => {
                failed += 1;
                ui::step_error_detail(&ctx, &request.target, &e.to_string());
                if e.is_retryable() {
                    ui::remark(&ctx, "Transient failure, rerunning the batch may succeed");
                }
            }
        }
    }

    if failed > 0 {
        return Err(LaminaError::User(format!(
            "{} of {} build(s) failed",
            failed,
            requests.len()
        )));
    }
    Ok(())
}
