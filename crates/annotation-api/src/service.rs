//! Annotation service facade
//!
//! Lifecycle: constructed, synced, any number of [`AnnotationService::edit`]
//! calls, then [`AnnotationService::save`]. Pending changes are resolved
//! together at save time so changes of one batch can build on each other.
//! A save either updates every touched file or none of them.

use crate::editor::{FileEditor, MemoryEditor};
use crate::preview::FilePreview;
use crate::project::{Project, Service};
use annotation_cds::{CdsCompiler, CdsServiceAdapter};
use annotation_core::{
    ApiError, Change, CompiledService, ConversionContext, FileCache,
    FileMergeMaps, Result, SaveOptions, ServiceAdapter, ServiceOptions, ServiceSchema, Target,
    TextFile, VocabularyService, WorkspaceEdit, apply_text_edits, build_schema, convert,
};
use annotation_xml::XmlServiceAdapter;
use std::sync::Arc;

/// Outcome of a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveResult {
    /// Number of files whose text was edited
    pub files: usize,
}

pub struct AnnotationServiceBuilder {
    project: Project,
    service: Service,
    options: ServiceOptions,
    vocabularies: Option<Arc<VocabularyService>>,
    editor: Option<Box<dyn FileEditor>>,
    cds_compiler: Option<Arc<dyn CdsCompiler>>,
}

impl AnnotationServiceBuilder {
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn vocabularies(mut self, vocabularies: Arc<VocabularyService>) -> Self {
        self.vocabularies = Some(vocabularies);
        self
    }

    pub fn editor(mut self, editor: impl FileEditor + 'static) -> Self {
        self.editor = Some(Box::new(editor));
        self
    }

    /// Required for `cap-cds` services
    pub fn cds_compiler(mut self, compiler: Arc<dyn CdsCompiler>) -> Self {
        self.cds_compiler = Some(compiler);
        self
    }

    pub fn build(self) -> Result<AnnotationService> {
        let vocabularies = self
            .vocabularies
            .unwrap_or_else(|| Arc::new(VocabularyService::new()));
        let adapter: Box<dyn ServiceAdapter> = match &self.service {
            Service::LocalEdmx {
                metadata,
                annotation_files,
            } => Box::new(XmlServiceAdapter::new(
                Some(metadata.uri.clone()),
                annotation_files.iter().map(|file| file.uri.clone()).collect(),
                Arc::clone(&vocabularies),
                self.options.xml.clone(),
            )),
            Service::CapCds { files } => {
                if !self.project.project_type.is_cap() {
                    return Err(ApiError::config_error(format!(
                        "CDS services require a CAP project, found {:?}",
                        self.project.project_type
                    )));
                }
                let compiler = self.cds_compiler.ok_or_else(|| {
                    ApiError::config_error("CDS services require a CDS compiler")
                })?;
                Box::new(CdsServiceAdapter::new(&self.project.root, files.clone(), compiler))
            }
        };
        tracing::debug!(
            "Created {} annotation service for {}",
            self.service.kind(),
            self.project.root
        );
        Ok(AnnotationService {
            project: self.project,
            options: self.options,
            vocabularies,
            editor: self
                .editor
                .unwrap_or_else(|| Box::new(MemoryEditor::new())),
            adapter,
            cache: FileCache::new(),
            pending: Vec::new(),
            schema: None,
            synced: false,
        })
    }
}

/// Entry point for editing the annotations of one service
pub struct AnnotationService {
    project: Project,
    options: ServiceOptions,
    vocabularies: Arc<VocabularyService>,
    editor: Box<dyn FileEditor>,
    adapter: Box<dyn ServiceAdapter>,
    cache: FileCache,
    pending: Vec<Change>,
    /// Schema and merge maps of the current compiled service
    schema: Option<(ServiceSchema, FileMergeMaps)>,
    synced: bool,
}

impl std::fmt::Debug for AnnotationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationService")
            .field("project", &self.project)
            .field("options", &self.options)
            .field("pending", &self.pending.len())
            .field("synced", &self.synced)
            .finish_non_exhaustive()
    }
}

impl AnnotationService {
    pub fn builder(project: Project, service: Service) -> AnnotationServiceBuilder {
        AnnotationServiceBuilder {
            project,
            service,
            options: ServiceOptions::default(),
            vocabularies: None,
            editor: None,
            cds_compiler: None,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn files(&self) -> &[TextFile] {
        self.adapter.files()
    }

    pub fn compiled_service(&self) -> &CompiledService {
        self.adapter.compiled_service()
    }

    /// Cached text of every service file
    pub fn file_cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn file_text(&self, uri: &str) -> Option<&str> {
        self.cache.get(uri).map(String::as_str)
    }

    pub fn pending_changes(&self) -> &[Change] {
        &self.pending
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Read every service file through the editor and rebuild the compiled
    /// service
    pub async fn sync(&mut self) -> Result<()> {
        let mut cache = FileCache::new();
        for file in self.adapter.files() {
            let text = self.editor.read(&file.uri).await?;
            tracing::trace!("Read {} ({} bytes)", file.uri, text.len());
            cache.insert(file.uri.clone(), text);
        }
        self.adapter.sync(&cache).await?;
        self.cache = cache;
        self.schema = None;
        self.synced = true;
        tracing::debug!(
            "Synced {} file(s), {} annotation file(s)",
            self.cache.len(),
            self.adapter.compiled_service().annotation_files.len()
        );
        Ok(())
    }

    async fn ensure_synced(&mut self) -> Result<()> {
        if !self.synced {
            self.sync().await?;
        }
        Ok(())
    }

    /// Queue changes; nothing is resolved until [`Self::save`]
    pub fn edit(&mut self, changes: impl IntoIterator<Item = Change>) {
        let before = self.pending.len();
        self.pending.extend(changes);
        tracing::trace!("Queued {} change(s)", self.pending.len() - before);
    }

    /// Schema of the compiled service; also refreshes the merge maps used
    /// for targets split over several files
    pub async fn get_schema(&mut self) -> Result<&ServiceSchema> {
        self.ensure_synced().await?;
        let built = self.build_schema();
        let (schema, _) = self.schema.insert(built);
        Ok(&*schema)
    }

    fn build_schema(&self) -> (ServiceSchema, FileMergeMaps) {
        let split =
            self.options.split_annotation_support && self.adapter.supports_split_annotations();
        build_schema(self.adapter.compiled_service(), &self.vocabularies, split)
    }

    fn workspace_edit(&mut self, changes: &[Change]) -> Result<WorkspaceEdit> {
        let (schema, merge_maps) = match self.schema.take() {
            Some(schema) => schema,
            None => self.build_schema(),
        };
        let context = ConversionContext {
            service: self.adapter.compiled_service(),
            merge_maps: &merge_maps,
            schema: &schema,
            vocabularies: self.vocabularies.as_ref(),
        };
        let converted = convert(context, changes);
        self.schema = Some((schema, merge_maps));
        self.adapter.get_workspace_edit(&converted?)
    }

    /// New text of every file touched by `edit`
    fn apply(&self, edit: &WorkspaceEdit) -> Result<Vec<(String, String, usize)>> {
        edit.changes
            .iter()
            .filter(|(_, edits)| !edits.is_empty())
            .map(|(uri, edits)| {
                let text = self.cache.get(uri).ok_or_else(|| {
                    ApiError::general(format!("File '{uri}' is not part of the service"))
                })?;
                let updated = apply_text_edits(text, edits)?;
                Ok((uri.clone(), updated, edits.len()))
            })
            .collect()
    }

    /// Diff of every file the pending changes would touch; the cache and
    /// the pending list are left as they are
    pub async fn preview(&mut self) -> Result<Vec<FilePreview>> {
        self.ensure_synced().await?;
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let pending = self.pending.clone();
        let edit = self.workspace_edit(&pending)?;
        let previews = self
            .apply(&edit)?
            .into_iter()
            .map(|(uri, updated, edit_count)| {
                let original = self.cache.get(&uri).cloned().unwrap_or_default();
                FilePreview::new(&uri, original, updated, edit_count)
            })
            .collect();
        Ok(previews)
    }

    /// Resolve and apply all pending changes
    ///
    /// The edited text is validated as a whole. When validation fails the
    /// file cache is restored to its state before the save and nothing is
    /// written; compile errors are reported as [`ApiError::CompileError`]
    /// with the messages of every broken file.
    pub async fn save(&mut self, options: SaveOptions) -> Result<SaveResult> {
        self.ensure_synced().await?;
        let changes = std::mem::take(&mut self.pending);
        if changes.is_empty() {
            return Ok(SaveResult::default());
        }

        let edit = match self.workspace_edit(&changes) {
            Ok(edit) => edit,
            Err(error) => {
                self.schema = None;
                return Err(error);
            }
        };
        let updated = self.apply(&edit)?;
        let snapshot = self.cache.clone();
        for (uri, text, edit_count) in &updated {
            tracing::debug!("Applying {} edit(s) to {}", edit_count, uri);
            self.cache.insert(uri.clone(), text.clone());
        }
        self.schema = None;

        match self.adapter.validate_changes(&self.cache).await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => {
                tracing::warn!(
                    "Save rejected, {} file(s) failed validation; rolling back",
                    report.messages.len()
                );
                self.cache = snapshot;
                return Err(ApiError::compile_error(report.messages));
            }
            Err(error) => {
                if error.code().is_rollback_trigger() {
                    tracing::warn!("Validation failed ({}); rolling back", error.code().as_str());
                    self.cache = snapshot;
                }
                return Err(error);
            }
        }

        for (uri, text, _) in &updated {
            self.editor.write(uri, text);
        }
        if self.options.commit_on_save {
            self.editor.commit().await?;
        }
        tracing::info!("Saved {} change(s) to {} file(s)", changes.len(), updated.len());

        if options.resync_after_save {
            self.sync().await?;
        }
        Ok(SaveResult {
            files: updated.len(),
        })
    }

    /// Persist writes staged by earlier saves when `commit_on_save` is off
    pub async fn commit(&mut self) -> Result<()> {
        self.editor.commit().await
    }

    /// Render a target in the syntax of `uri`
    pub fn serialize_target(&self, target: &Target, uri: &str) -> Result<String> {
        self.adapter.serialize_target(target, uri)
    }
}
