//! Service adapter for CDS sources

use crate::compiler::{CdsCompilation, CdsCompiler};
use crate::printer::CdsPrinter;
use crate::writer::{CdsWriter, detect_indent};
use annotation_core::{
    AnnotationFile, AnnotationFileChange, ApiError, CompiledService, FileCache, LineEnding, Result,
    ServiceAdapter, Target, TextEdit, TextFile, ValidationReport, WorkspaceEdit,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;

const DEFAULT_INDENT: &str = "    ";

/// Adapter for a CAP service whose annotations live in CDS files
pub struct CdsServiceAdapter {
    /// Uri of the project root, ending with `/`
    project_root: String,
    files: Vec<TextFile>,
    compiler: Arc<dyn CdsCompiler>,
    /// Texts the current compiled service was built from
    texts: FileCache,
    service: CompiledService,
}

impl std::fmt::Debug for CdsServiceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdsServiceAdapter")
            .field("project_root", &self.project_root)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl CdsServiceAdapter {
    pub fn new(project_root: &str, files: Vec<TextFile>, compiler: Arc<dyn CdsCompiler>) -> Self {
        let project_root = if project_root.ends_with('/') {
            project_root.to_string()
        } else {
            format!("{project_root}/")
        };
        Self {
            project_root,
            files,
            compiler,
            texts: FileCache::new(),
            service: CompiledService::default(),
        }
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    fn sources(&self, cache: &FileCache) -> Result<FileCache> {
        self.files
            .iter()
            .map(|file| {
                cache
                    .get(&file.uri)
                    .map(|text| (file.uri.clone(), text.clone()))
                    .ok_or_else(|| {
                        ApiError::general(format!("File '{}' is not in the file cache", file.uri))
                    })
            })
            .collect()
    }

    fn install(&mut self, sources: FileCache, compilation: CdsCompilation) {
        tracing::debug!(
            "Compiled {} CDS file(s) into {} annotation file(s)",
            sources.len(),
            compilation.annotation_files.len()
        );
        self.service = CompiledService {
            odata_version: compilation
                .metadata
                .odata_version
                .clone()
                .unwrap_or_else(|| "4.0".to_string()),
            metadata: compilation.metadata,
            annotation_files: compilation.annotation_files,
        };
        self.texts = sources;
    }

    /// Syntax errors of files inside the project, keyed by uri
    ///
    /// Compiler messages are keyed by paths relative to the project root.
    fn report(&self, compilation: &CdsCompilation) -> ValidationReport {
        let known: IndexMap<String, &str> = self
            .files
            .iter()
            .map(|file| (relative_path(&self.project_root, &file.uri), file.uri.as_str()))
            .collect();
        let mut report = ValidationReport::default();
        for (path, message) in &compilation.messages {
            if !message.has_syntax_errors {
                continue;
            }
            let path = path.replace('\\', "/");
            if path.starts_with("../") {
                tracing::debug!("Ignoring compiler errors outside the project: {}", path);
                continue;
            }
            let uri = match known.get(path.as_str()) {
                Some(uri) => uri.to_string(),
                None => format!("{}{path}", self.project_root),
            };
            for diagnostic in &message.messages {
                report.add(uri.clone(), diagnostic.message.clone());
            }
        }
        report
    }

    fn file_edits(
        &self,
        uri: &str,
        changes: &[&AnnotationFileChange],
    ) -> Result<Vec<TextEdit>> {
        let text = self.texts.get(uri).ok_or_else(|| {
            ApiError::general(format!("No CDS source for '{uri}'"))
        })?;
        let empty = AnnotationFile::new(uri);
        let file = self.service.file(uri).unwrap_or(&empty);
        let indent = detect_indent(text).unwrap_or_else(|| DEFAULT_INDENT.to_string());
        let writer = CdsWriter::new(file, text, &indent, LineEnding::Auto.resolve(text));
        writer.text_edits(changes)
    }
}

/// Path of `uri` relative to `root`, with `../` segments for uris outside it
pub(crate) fn relative_path(root: &str, uri: &str) -> String {
    if let Some(inside) = uri.strip_prefix(root) {
        return inside.to_string();
    }
    let root_segments: Vec<&str> = root.trim_end_matches('/').split('/').collect();
    let uri_segments: Vec<&str> = uri.split('/').collect();
    let common = root_segments
        .iter()
        .zip(&uri_segments)
        .take_while(|(a, b)| a == b)
        .count();
    let mut path = "../".repeat(root_segments.len() - common);
    path.push_str(&uri_segments[common..].join("/"));
    path
}

#[async_trait]
impl ServiceAdapter for CdsServiceAdapter {
    fn compiled_service(&self) -> &CompiledService {
        &self.service
    }

    fn files(&self) -> &[TextFile] {
        &self.files
    }

    fn supports_split_annotations(&self) -> bool {
        true
    }

    async fn sync(&mut self, cache: &FileCache) -> Result<()> {
        let sources = self.sources(cache)?;
        let compilation = self.compiler.compile(&self.project_root, &sources).await?;
        if compilation.messages.values().any(|message| message.has_syntax_errors) {
            tracing::warn!("CDS sources of {} have syntax errors", self.project_root);
        }
        self.install(sources, compilation);
        Ok(())
    }

    fn get_workspace_edit(&self, changes: &[AnnotationFileChange]) -> Result<WorkspaceEdit> {
        let mut by_uri: IndexMap<&str, Vec<&AnnotationFileChange>> = IndexMap::new();
        for change in changes {
            by_uri.entry(change.uri()).or_default().push(change);
        }
        let mut edit = WorkspaceEdit::new();
        for (uri, changes) in by_uri {
            edit.add(uri, self.file_edits(uri, &changes)?);
        }
        Ok(edit)
    }

    /// Recompile; only syntax errors inside the project are reported
    async fn validate_changes(&mut self, cache: &FileCache) -> Result<ValidationReport> {
        let sources = self.sources(cache)?;
        let compilation = self.compiler.compile(&self.project_root, &sources).await?;
        let report = self.report(&compilation);
        if report.is_empty() {
            self.install(sources, compilation);
        }
        Ok(report)
    }

    fn serialize_target(&self, target: &Target, uri: &str) -> Result<String> {
        let text = self.texts.get(uri).map(String::as_str).unwrap_or_default();
        let indent = detect_indent(text).unwrap_or_else(|| DEFAULT_INDENT.to_string());
        CdsPrinter::new(&indent, LineEnding::Auto.resolve(text)).print_target(target, "")
    }
}
