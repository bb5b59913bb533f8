//! pip-based resolver for `requirements.txt`

use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::resolver::{error_output, PackageResolver};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Descriptor file name, used in error messages
const DESCRIPTOR: &str = "requirements.txt";

/// Resolves requirements into wheels with `pip wheel`
#[derive(Debug, Clone)]
pub struct PipResolver {
    pip: String,
    extra_args: Vec<String>,
}

impl PipResolver {
    /// Create a resolver invoking the `pip` executable
    pub fn new(pip: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            pip: pip.into(),
            extra_args,
        }
    }

    fn command_line(&self, requirements: &Path, wheel_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "wheel".to_string(),
            "--disable-pip-version-check".to_string(),
            "--no-input".to_string(),
            "--requirement".to_string(),
            requirements.display().to_string(),
            "--wheel-dir".to_string(),
            wheel_dir.display().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Default for PipResolver {
    fn default() -> Self {
        Self::new("pip3", Vec::new())
    }
}

/// Reject descriptors pip could never parse before spawning anything
fn validate_requirements(descriptor: &[u8]) -> LaminaResult<()> {
    let text = std::str::from_utf8(descriptor).map_err(|e| LaminaError::MalformedDescriptor {
        descriptor: DESCRIPTOR.to_string(),
        reason: format!("not valid UTF-8: {}", e),
    })?;
    if let Some(line) = text.lines().position(|l| l.contains('\0')) {
        return Err(LaminaError::MalformedDescriptor {
            descriptor: DESCRIPTOR.to_string(),
            reason: format!("NUL byte on line {}", line + 1),
        });
    }
    Ok(())
}

/// List wheels in `dir`, sorted by file name
async fn collect_wheels(dir: &Path) -> LaminaResult<Vec<PathBuf>> {
    let mut wheels = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LaminaError::io(format!("listing {}", dir.display()), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LaminaError::io(format!("listing {}", dir.display()), e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "whl") {
            wheels.push(path);
        }
    }
    wheels.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(wheels)
}

#[async_trait]
impl PackageResolver for PipResolver {
    async fn resolve(
        &self,
        descriptor: &[u8],
        work_dir: &Path,
        deadline: Deadline,
    ) -> LaminaResult<Vec<PathBuf>> {
        validate_requirements(descriptor)?;

        let requirements = work_dir.join(DESCRIPTOR);
        let wheel_dir = work_dir.join("wheels");
        tokio::fs::write(&requirements, descriptor)
            .await
            .map_err(|e| LaminaError::io(format!("writing {}", requirements.display()), e))?;
        tokio::fs::create_dir_all(&wheel_dir)
            .await
            .map_err(|e| LaminaError::io(format!("creating {}", wheel_dir.display()), e))?;

        let args = self.command_line(&requirements, &wheel_dir);
        info!("Resolving {} with {}", DESCRIPTOR, self.pip);
        debug!(
            "Executing: {} {:?} (time left: {:?})",
            self.pip,
            args,
            deadline.remaining()
        );

        let mut command = Command::new(&self.pip);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = deadline
            .run(&format!("{} wheel", self.pip), async {
                command
                    .output()
                    .await
                    .map_err(|e| LaminaError::ResolverFailure {
                        tool: self.pip.clone(),
                        reason: format!("failed to start: {}", e),
                    })
            })
            .await?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = error_output(&stdout, &stderr);
            if stderr.contains("Invalid requirement") {
                return Err(LaminaError::MalformedDescriptor {
                    descriptor: DESCRIPTOR.to_string(),
                    reason: tail,
                });
            }
            return Err(LaminaError::ResolverFailure {
                tool: self.pip.clone(),
                reason: match output.status.code() {
                    Some(code) => format!("exit code {}\n{}", code, tail),
                    None => format!("terminated by signal\n{}", tail),
                },
            });
        }

        let wheels = collect_wheels(&wheel_dir).await?;
        info!("Resolved {} package(s)", wheels.len());
        Ok(wheels)
    }

    fn resolver_name(&self) -> &'static str {
        "pip"
    }
}
