//! Storage abstraction
//!
//! The service never touches storage directly. Writes are staged in the
//! editor and become durable on [`FileEditor::commit`].

use annotation_core::{ApiError, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[async_trait]
pub trait FileEditor: Send + Sync {
    /// Current text of a file, staged writes included
    async fn read(&self, uri: &str) -> Result<String>;

    /// Stage new text for a file
    fn write(&mut self, uri: &str, text: &str);

    /// Persist staged writes
    async fn commit(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryFiles {
    staged: IndexMap<String, String>,
    committed: IndexMap<String, String>,
    commits: usize,
}

/// In-memory editor; clones share the same files
#[derive(Debug, Clone, Default)]
pub struct MemoryEditor {
    files: Arc<Mutex<MemoryFiles>>,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor whose files are already committed
    pub fn with_files<I, U, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (U, T)>,
        U: Into<String>,
        T: Into<String>,
    {
        let committed: IndexMap<String, String> = files
            .into_iter()
            .map(|(uri, text)| (uri.into(), text.into()))
            .collect();
        let editor = Self::new();
        editor.lock().committed = committed;
        editor
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFiles> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last committed text of a file
    pub fn committed(&self, uri: &str) -> Option<String> {
        self.lock().committed.get(uri).cloned()
    }

    pub fn has_staged_writes(&self) -> bool {
        !self.lock().staged.is_empty()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }
}

#[async_trait]
impl FileEditor for MemoryEditor {
    async fn read(&self, uri: &str) -> Result<String> {
        let files = self.lock();
        files
            .staged
            .get(uri)
            .or_else(|| files.committed.get(uri))
            .cloned()
            .ok_or_else(|| {
                ApiError::io_error(
                    uri,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                )
            })
    }

    fn write(&mut self, uri: &str, text: &str) {
        self.lock().staged.insert(uri.to_string(), text.to_string());
    }

    async fn commit(&mut self) -> Result<()> {
        let mut files = self.lock();
        let staged = std::mem::take(&mut files.staged);
        files.committed.extend(staged);
        files.commits += 1;
        Ok(())
    }
}

/// Editor over the local filesystem; `file://` uris and plain paths are
/// accepted
#[derive(Debug, Default)]
pub struct FsEditor {
    staged: IndexMap<String, String>,
}

impl FsEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> impl Iterator<Item = &str> {
        self.staged.keys().map(String::as_str)
    }
}

pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

#[async_trait]
impl FileEditor for FsEditor {
    async fn read(&self, uri: &str) -> Result<String> {
        if let Some(text) = self.staged.get(uri) {
            return Ok(text.clone());
        }
        let path = uri_to_path(uri);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ApiError::io_error(path, e))
    }

    fn write(&mut self, uri: &str, text: &str) {
        self.staged.insert(uri.to_string(), text.to_string());
    }

    async fn commit(&mut self) -> Result<()> {
        for (uri, text) in &self.staged {
            let path = uri_to_path(uri);
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ApiError::io_error(parent, e))?;
            }
            tokio::fs::write(&path, text)
                .await
                .map_err(|e| ApiError::io_error(&path, e))?;
            tracing::debug!("Wrote {}", path.display());
        }
        self.staged.clear();
        Ok(())
    }
}
