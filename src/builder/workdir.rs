//! Scoped working directories for builders
//!
//! Each dependency build gets a fresh directory under the state dir
//! (`~/.local/state/lamina/builds/<uuid>`). The directory is removed by
//! `remove()` on the normal path and by `Drop` on every other path,
//! including errors and cancellation.

use crate::error::{LaminaError, LaminaResult};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A build-scoped directory removed when released
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    released: bool,
}

impl WorkDir {
    /// Create a unique directory below `root`
    pub async fn create(root: &Path) -> LaminaResult<Self> {
        let path = root.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| LaminaError::io(format!("creating work dir {}", path.display()), e))?;
        debug!("Created work dir {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it
    pub async fn remove(mut self) -> LaminaResult<()> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("Removed work dir {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LaminaError::io(
                format!("removing work dir {}", self.path.display()),
                e,
            )),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove work dir {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn remove_deletes_directory() {
        let root = TempDir::new().unwrap();
        let work = WorkDir::create(root.path()).await.unwrap();
        let path = work.path().to_path_buf();
        std::fs::write(path.join("requirements.txt"), "flask\n").unwrap();

        work.remove().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_deletes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let work = WorkDir::create(root.path()).await.unwrap();
            std::fs::create_dir_all(work.path().join("wheels")).unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn directories_are_unique() {
        let root = TempDir::new().unwrap();
        let a = WorkDir::create(root.path()).await.unwrap();
        let b = WorkDir::create(root.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
