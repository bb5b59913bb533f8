//! Package resolvers
//!
//! A resolver turns a dependency descriptor into package artifacts on local
//! disk. It is the slow, external part of a dependency layer build and is
//! only invoked on a cache miss.

mod pip;
pub mod wheel;

pub use pip::PipResolver;
pub use wheel::Wheel;

use crate::deadline::Deadline;
use crate::error::LaminaResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Max number of tool output lines kept in resolver error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Materializes the packages named by a descriptor
#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Resolve `descriptor` into package artifacts placed under `work_dir`.
    ///
    /// Returned paths are in deterministic order.
    async fn resolve(
        &self,
        descriptor: &[u8],
        work_dir: &Path,
        deadline: Deadline,
    ) -> LaminaResult<Vec<PathBuf>>;

    /// Human-readable tool name for display
    fn resolver_name(&self) -> &'static str;
}

/// Keep the useful tail of tool output for error diagnostics.
pub(crate) fn error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}
