//! Source contexts
//!
//! A source context is the set of files packaged into the application layer.
//! File listings are always relative, `/`-separated and sorted, so every
//! consumer sees them in the same order across builds.

mod memory;
mod workspace;

pub use memory::MemoryContext;
pub use workspace::Workspace;

use crate::error::LaminaResult;

/// Read access to the files of an application
pub trait SourceContext: Send + Sync {
    /// All file paths, relative to the context root, in deterministic order
    fn list_files(&self) -> LaminaResult<Vec<String>>;

    /// Contents of a single file
    fn get_file(&self, path: &str) -> LaminaResult<Vec<u8>>;

    /// Whether a file exists at `path` (used for ecosystem marker detection)
    fn contains(&self, path: &str) -> bool;
}
