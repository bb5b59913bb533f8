//! In-memory source context

use crate::context::SourceContext;
use crate::error::{LaminaError, LaminaResult};
use std::collections::BTreeMap;

/// Source context backed by a sorted map of path to contents
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous contents
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl<P: Into<String>, C: Into<Vec<u8>>> FromIterator<(P, C)> for MemoryContext {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(path, contents)| (path.into(), contents.into()))
                .collect(),
        }
    }
}

impl SourceContext for MemoryContext {
    fn list_files(&self) -> LaminaResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn get_file(&self, path: &str) -> LaminaResult<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| LaminaError::FileNotFound(path.to_string()))
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
