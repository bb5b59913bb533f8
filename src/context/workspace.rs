//! Directory-backed source context

use crate::context::SourceContext;
use crate::error::{LaminaError, LaminaResult};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directories never packaged into the application layer
const SKIPPED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules", ".venv", "venv"];

/// Source context rooted at a local directory
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace at `root`, which must be an existing directory
    pub fn open(root: impl Into<PathBuf>) -> LaminaResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LaminaError::PathNotFound(root));
        }
        debug!("Opened workspace at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the workspace
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative context path, refusing anything escaping the root
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

impl SourceContext for Workspace {
    fn list_files(&self) -> LaminaResult<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped(e));

        for entry in walker {
            let entry = entry.map_err(|e| {
                LaminaError::io(
                    format!("walking {}", self.root.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }

        // walkdir sorts per directory; a global sort keeps the listing stable
        // regardless of how names compare against their parent directories.
        files.sort();
        Ok(files)
    }

    fn get_file(&self, path: &str) -> LaminaResult<Vec<u8>> {
        let full = self
            .resolve(path)
            .ok_or_else(|| LaminaError::FileNotFound(path.to_string()))?;
        fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LaminaError::FileNotFound(path.to_string())
            } else {
                LaminaError::io(format!("reading {}", full.display()), e)
            }
        })
    }

    fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|p| p.is_file())
    }
}
