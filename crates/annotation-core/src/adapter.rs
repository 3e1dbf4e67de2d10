//! Source adapter boundary
//!
//! An adapter owns the concrete syntax of one service's files. It parses the
//! file cache into a [`CompiledService`], turns internal changes into a
//! [`WorkspaceEdit`] and validates edited text.

use crate::internal::AnnotationFileChange;
use crate::model::{AnnotationFile, Namespace, Target};
use crate::result::Result;
use crate::text_edit::WorkspaceEdit;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// uri -> current text of every file known to a service
pub type FileCache = IndexMap<String, String>;

/// A file belonging to a service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFile {
    pub uri: String,
    #[serde(default)]
    pub read_only: bool,
}

impl TextFile {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            read_only: false,
        }
    }

    pub fn read_only(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            read_only: true,
        }
    }
}

/// What the adapters extract from service metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSummary {
    pub uri: Option<String>,
    pub odata_version: Option<String>,
    /// Service schema namespaces with their aliases
    pub namespaces: Vec<Namespace>,
}

/// Snapshot of a parsed service, rebuilt by every sync
#[derive(Debug, Clone, Default)]
pub struct CompiledService {
    pub odata_version: String,
    pub metadata: MetadataSummary,
    pub annotation_files: Vec<AnnotationFile>,
}

impl CompiledService {
    pub fn file(&self, uri: &str) -> Option<&AnnotationFile> {
        self.annotation_files.iter().find(|file| file.uri == uri)
    }
}

/// Errors found while validating edited text, keyed by uri
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub messages: IndexMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.messages.values().all(Vec::is_empty)
    }

    pub fn add(&mut self, uri: impl Into<String>, message: impl Into<String>) {
        self.messages.entry(uri.into()).or_default().push(message.into());
    }
}

/// Source-syntax specific half of the annotation service
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Result of the last sync
    fn compiled_service(&self) -> &CompiledService;

    /// Files of the service (metadata and annotation files)
    fn files(&self) -> &[TextFile];

    /// Whether targets may be split over several files
    fn supports_split_annotations(&self) -> bool {
        false
    }

    /// Reparse every file from the cache; missing files are an error
    async fn sync(&mut self, cache: &FileCache) -> Result<()>;

    /// Text edits realizing the given internal changes
    fn get_workspace_edit(&self, changes: &[AnnotationFileChange]) -> Result<WorkspaceEdit>;

    /// Check edited text; an empty report means the edit is accepted
    async fn validate_changes(&mut self, cache: &FileCache) -> Result<ValidationReport>;

    /// Render a target with its annotations in the syntax of `uri`
    fn serialize_target(&self, target: &Target, uri: &str) -> Result<String>;
}
