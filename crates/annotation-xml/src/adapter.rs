//! Service adapter for EDMX annotation files

use crate::annotation_file::{XmlAnnotationFile, metadata_summary};
use crate::document::XmlDocument;
use crate::printer::{XmlPrinter, target_element};
use crate::references::{reference_changes, used_namespaces};
use crate::writer::{XmlDocumentChange, XmlWriter, detect_indent, sort_and_check};
use annotation_core::text_edit::apply_offset_edits;
use annotation_core::{
    AliasInformation, AnnotationFileChange, ApiError, CompiledService, FileCache,
    MetadataSummary, Pointer, Result, ServiceAdapter, Target, TextEdit, TextFile,
    ValidationReport, VocabularyService, WorkspaceEdit, XmlFormatOptions,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Parsed state of one annotation file
#[derive(Debug)]
struct XmlAnnotationDocument {
    document: XmlDocument,
    derived: XmlAnnotationFile,
    /// Vocabulary namespaces used at sync time
    used: BTreeSet<String>,
}

/// Adapter for a service described by an EDMX metadata document and XML
/// annotation files
#[derive(Debug)]
pub struct XmlServiceAdapter {
    metadata_uri: Option<String>,
    annotation_uris: Vec<String>,
    files: Vec<TextFile>,
    vocabularies: Arc<VocabularyService>,
    options: XmlFormatOptions,
    documents: IndexMap<String, XmlAnnotationDocument>,
    service: CompiledService,
}

impl XmlServiceAdapter {
    pub fn new(
        metadata_uri: Option<String>,
        annotation_uris: Vec<String>,
        vocabularies: Arc<VocabularyService>,
        options: XmlFormatOptions,
    ) -> Self {
        let mut files: Vec<TextFile> = metadata_uri.iter().map(TextFile::read_only).collect();
        files.extend(annotation_uris.iter().map(TextFile::new));
        Self {
            metadata_uri,
            annotation_uris,
            files,
            vocabularies,
            options,
            documents: IndexMap::new(),
            service: CompiledService::default(),
        }
    }

    pub fn document(&self, uri: &str) -> Option<&XmlDocument> {
        self.documents.get(uri).map(|entry| &entry.document)
    }

    fn entry(&self, uri: &str) -> Result<&XmlAnnotationDocument> {
        self.documents
            .get(uri)
            .ok_or_else(|| ApiError::general(format!("No annotation document for '{uri}'")))
    }

    fn file_edits(&self, uri: &str, changes: &[&AnnotationFileChange]) -> Result<Vec<TextEdit>> {
        let entry = self.entry(uri)?;
        let mut writer = XmlWriter::new(&entry.document, &self.options);
        for change in self.xml_changes(entry, changes)? {
            writer.add_change(change);
        }
        let mut edits = writer.offset_edits()?;

        let updated = apply_offset_edits(entry.document.text(), edits.clone())?;
        let reparsed = XmlDocument::parse(uri, updated)?;
        let after = XmlAnnotationFile::derive(&reparsed);
        let aliases = AliasInformation::for_file(&after.file, &self.service.metadata, &self.vocabularies);
        let used_after = used_namespaces(&after.file, &aliases);
        let references = reference_changes(
            &entry.document,
            &entry.derived,
            &entry.used,
            &used_after,
            &self.vocabularies,
        );
        if !references.is_empty() {
            let mut reference_writer = XmlWriter::new(&entry.document, &self.options);
            for change in references {
                reference_writer.add_change(change);
            }
            edits.extend(reference_writer.offset_edits()?);
            sort_and_check(&mut edits, &entry.document)?;
        }

        let index = entry.document.line_index();
        Ok(edits.iter().map(|edit| index.to_text_edit(edit)).collect())
    }

    /// Translate internal changes, deleting whole `Annotations` elements
    /// whose every term is deleted and that receive nothing new
    fn xml_changes(
        &self,
        entry: &XmlAnnotationDocument,
        changes: &[&AnnotationFileChange],
    ) -> Result<Vec<XmlDocumentChange>> {
        let mut deleted_terms: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        let mut inserted_into = HashSet::new();
        for change in changes {
            match change {
                AnnotationFileChange::DeleteElement { pointer, .. } => {
                    if let Some((target, term)) = term_position(pointer) {
                        deleted_terms.entry(target).or_default().insert(term);
                    }
                }
                AnnotationFileChange::InsertElement { pointer, .. }
                | AnnotationFileChange::MoveElements { pointer, .. } => {
                    if let Some(target) = target_position(pointer) {
                        inserted_into.insert(target);
                    }
                }
                _ => {}
            }
        }
        let targets = &entry.derived.file.targets;
        let pruned: HashSet<usize> = deleted_terms
            .iter()
            .filter(|(target, terms)| {
                !inserted_into.contains(*target)
                    && targets
                        .get(**target)
                        .is_some_and(|t| t.terms.len() == terms.len())
            })
            .map(|(target, _)| *target)
            .collect();

        let mut result = Vec::with_capacity(changes.len());
        let mut emitted = HashSet::new();
        for change in changes {
            if let AnnotationFileChange::DeleteElement { pointer, .. } = change {
                if let Some((target, _)) = term_position(pointer).filter(|(t, _)| pruned.contains(t)) {
                    if emitted.insert(target) {
                        tracing::debug!("Deleting emptied target {}", targets[target].name);
                        result.push(XmlDocumentChange::DeleteElement {
                            pointer: entry.derived.target_pointers[target].clone(),
                        });
                    }
                    continue;
                }
            }
            result.push(self.xml_change(entry, change)?);
        }
        Ok(result)
    }

    fn xml_change(
        &self,
        entry: &XmlAnnotationDocument,
        change: &AnnotationFileChange,
    ) -> Result<XmlDocumentChange> {
        let xml = |pointer: &Pointer| {
            entry
                .derived
                .to_xml_pointer(&entry.document, pointer)
                .ok_or_else(|| {
                    ApiError::general(format!(
                        "Cannot resolve '{pointer}' in '{}'",
                        entry.document.uri()
                    ))
                })
        };
        Ok(match change {
            AnnotationFileChange::InsertTarget { target, .. } => {
                let schema = entry.derived.schema_pointer.clone().ok_or_else(|| {
                    ApiError::general(format!("No Schema element in '{}'", entry.document.uri()))
                })?;
                XmlDocumentChange::InsertElement {
                    pointer: schema,
                    index: None,
                    element: target_element(target),
                }
            }
            AnnotationFileChange::InsertElement { pointer, index, element, .. } => {
                XmlDocumentChange::InsertElement {
                    pointer: xml(pointer)?,
                    index: *index,
                    element: element.clone(),
                }
            }
            AnnotationFileChange::InsertAttribute { pointer, name, value, .. } => {
                XmlDocumentChange::InsertAttribute {
                    pointer: xml(pointer)?,
                    name: name.clone(),
                    value: value.clone(),
                }
            }
            AnnotationFileChange::UpdateAttributeValue { pointer, value, .. } => {
                XmlDocumentChange::UpdateAttributeValue {
                    pointer: xml(pointer)?,
                    value: value.clone(),
                }
            }
            AnnotationFileChange::ReplaceElement { pointer, element, .. } => {
                XmlDocumentChange::ReplaceElement {
                    pointer: xml(pointer)?,
                    element: element.clone(),
                }
            }
            AnnotationFileChange::ReplaceElementContent { pointer, content, .. } => {
                XmlDocumentChange::ReplaceElementContent {
                    pointer: xml(pointer)?,
                    content: content.clone(),
                }
            }
            AnnotationFileChange::ReplaceAttribute { pointer, name, value, .. } => {
                XmlDocumentChange::ReplaceAttribute {
                    pointer: xml(pointer)?,
                    name: name.clone(),
                    value: value.clone(),
                }
            }
            AnnotationFileChange::DeleteElement { pointer, .. } => {
                XmlDocumentChange::DeleteElement { pointer: xml(pointer)? }
            }
            AnnotationFileChange::DeleteAttribute { pointer, .. } => {
                XmlDocumentChange::DeleteAttribute { pointer: xml(pointer)? }
            }
            AnnotationFileChange::MoveElements { pointer, from_pointers, index, .. } => {
                XmlDocumentChange::MoveCollectionValue {
                    pointer: xml(pointer)?,
                    from_pointers: from_pointers.iter().map(&xml).collect::<Result<_>>()?,
                    index: *index,
                }
            }
            AnnotationFileChange::ReplaceText { pointer, text, .. } => XmlDocumentChange::ReplaceText {
                pointer: xml(pointer)?,
                text: text.clone(),
            },
        })
    }
}

/// `/targets/N` -> N
fn target_position(pointer: &Pointer) -> Option<usize> {
    match pointer.segments() {
        [targets, index] if targets == "targets" => index.parse().ok(),
        _ => None,
    }
}

/// `/targets/N/terms/M` -> (N, M)
fn term_position(pointer: &Pointer) -> Option<(usize, usize)> {
    match pointer.segments() {
        [targets, target, terms, term] if targets == "targets" && terms == "terms" => {
            Some((target.parse().ok()?, term.parse().ok()?))
        }
        _ => None,
    }
}

fn cached<'c>(cache: &'c FileCache, uri: &str) -> Result<&'c str> {
    cache
        .get(uri)
        .map(String::as_str)
        .ok_or_else(|| ApiError::general(format!("File '{uri}' is not in the file cache")))
}

#[async_trait]
impl ServiceAdapter for XmlServiceAdapter {
    fn compiled_service(&self) -> &CompiledService {
        &self.service
    }

    fn files(&self) -> &[TextFile] {
        &self.files
    }

    async fn sync(&mut self, cache: &FileCache) -> Result<()> {
        let metadata = match &self.metadata_uri {
            Some(uri) => metadata_summary(&XmlDocument::parse(uri.as_str(), cached(cache, uri)?)?),
            None => MetadataSummary::default(),
        };
        let mut documents = IndexMap::new();
        let mut files = Vec::with_capacity(self.annotation_uris.len());
        for uri in &self.annotation_uris {
            let document = XmlDocument::parse(uri.as_str(), cached(cache, uri)?)?;
            let derived = XmlAnnotationFile::derive(&document);
            let aliases = AliasInformation::for_file(&derived.file, &metadata, &self.vocabularies);
            let used = used_namespaces(&derived.file, &aliases);
            files.push(derived.file.clone());
            documents.insert(
                uri.clone(),
                XmlAnnotationDocument {
                    document,
                    derived,
                    used,
                },
            );
        }
        tracing::debug!("Synced {} annotation file(s)", files.len());
        self.service = CompiledService {
            odata_version: metadata
                .odata_version
                .clone()
                .unwrap_or_else(|| "4.0".to_string()),
            metadata,
            annotation_files: files,
        };
        self.documents = documents;
        Ok(())
    }

    fn get_workspace_edit(&self, changes: &[AnnotationFileChange]) -> Result<WorkspaceEdit> {
        let mut by_uri: IndexMap<&str, Vec<&AnnotationFileChange>> = IndexMap::new();
        for change in changes {
            by_uri.entry(change.uri()).or_default().push(change);
        }
        let mut edit = WorkspaceEdit::new();
        for (uri, changes) in by_uri {
            let edits = self.file_edits(uri, &changes)?;
            edit.add(uri, edits);
        }
        Ok(edit)
    }

    /// XML files are valid when they parse
    async fn validate_changes(&mut self, cache: &FileCache) -> Result<ValidationReport> {
        self.sync(cache).await?;
        Ok(ValidationReport::default())
    }

    fn serialize_target(&self, target: &Target, uri: &str) -> Result<String> {
        let text = self.document(uri).map(XmlDocument::text).unwrap_or_default();
        let indent = detect_indent(text).unwrap_or_else(|| self.options.indent.clone());
        let eol = self.options.line_ending.resolve(text);
        Ok(XmlPrinter::new(&indent, eol).print_target(target, ""))
    }
}
