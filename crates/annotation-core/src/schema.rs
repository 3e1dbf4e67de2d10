//! Service schema and file merge maps
//!
//! The schema lists, per target, every annotation with its generic element
//! and AVT value. With split annotation support, annotations of one
//! target/term/qualifier spread over several files are merged into the
//! occurrence found first; the merge map then records where each merged
//! piece physically lives so the resolver can redirect changes.

use crate::adapter::CompiledService;
use crate::alias::AliasInformation;
use crate::avt::Expression;
use crate::avt::RawAnnotation;
use crate::avt::from_generic::element_to_annotation;
use crate::change::AnnotationReference;
use crate::error::ApiError;
use crate::model::{Element, Node, NodeRef, names};
use crate::pointer::Pointer;
use crate::result::Result;
use crate::vocabulary::VocabularyService;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Physical location of merged content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalLocation {
    pub uri: String,
    pub pointer: Pointer,
}

/// uri -> absolute pointer in that file's merged view -> physical location
pub type FileMergeMaps = HashMap<String, IndexMap<Pointer, PhysicalLocation>>;

/// Representation of the value found at a pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Attribute(String),
    Element(String),
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAnnotation {
    /// File holding the (first) occurrence
    pub uri: String,
    /// Absolute pointer of the annotation element in `uri`
    pub pointer: Pointer,
    pub value: RawAnnotation,
    pub element: Element,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTarget {
    pub name: String,
    pub annotations: Vec<SchemaAnnotation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceSchema {
    pub odata_version: String,
    pub targets: IndexMap<String, SchemaTarget>,
}

impl SchemaAnnotation {
    fn matches(&self, reference: &AnnotationReference) -> bool {
        self.value.term == reference.term && self.value.qualifier == reference.qualifier
    }
}

impl ServiceSchema {
    pub fn target(&self, name: &str) -> Option<&SchemaTarget> {
        self.targets.get(name)
    }

    /// The annotation a reference names, preferring the occurrence in `uri`
    pub fn annotation(&self, reference: &AnnotationReference, uri: &str) -> Option<&SchemaAnnotation> {
        let target = self.targets.get(&reference.target)?;
        let mut candidates = target.annotations.iter().filter(|a| a.matches(reference));
        let first = candidates.next()?;
        if first.uri == uri {
            return Some(first);
        }
        candidates.find(|a| a.uri == uri).or(Some(first))
    }

    /// Representation of the current value at `pointer` (relative to the
    /// annotation element); `Ok(None)` when nothing is there yet
    pub fn value_type_at(
        &self,
        reference: &AnnotationReference,
        uri: &str,
        pointer: &Pointer,
    ) -> Result<Option<ValueType>> {
        let annotation = self.annotation(reference, uri).ok_or_else(|| {
            ApiError::general(format!(
                "Annotation '{reference}' not found in schema for '{uri}'"
            ))
        })?;
        let value_type = match annotation.element.node_at(pointer) {
            None => None,
            Some(NodeRef::Attribute(attribute) | NodeRef::AttributeValue(attribute)) => {
                Some(ValueType::Attribute(attribute.name.clone()))
            }
            Some(NodeRef::Text(_)) => Some(ValueType::Text),
            Some(NodeRef::Element(element)) => value_type_of(element),
            Some(NodeRef::File(_) | NodeRef::Target(_)) => None,
        };
        Ok(value_type)
    }
}

/// Value representation of an element: for value holders the kind of their
/// value, for expressions the element itself
pub fn value_type_of(element: &Element) -> Option<ValueType> {
    if names::is_value_holder(&element.name) {
        if let Some(attribute) = element.expression_attribute() {
            return Some(ValueType::Attribute(attribute.name.clone()));
        }
        return element
            .expression_child()
            .map(|(_, child)| ValueType::Element(child.name.clone()));
    }
    Some(ValueType::Element(element.name.clone()))
}

/// Build the schema; merge maps stay empty unless `split` is set
pub fn build_schema(
    service: &CompiledService,
    vocabularies: &VocabularyService,
    split: bool,
) -> (ServiceSchema, FileMergeMaps) {
    let mut schema = ServiceSchema {
        odata_version: service.odata_version.clone(),
        targets: IndexMap::new(),
    };
    let mut merge_maps = FileMergeMaps::new();

    for file in &service.annotation_files {
        let aliases = AliasInformation::for_file(file, &service.metadata, vocabularies);
        for (target_index, target) in file.targets.iter().enumerate() {
            let target_name = aliases.to_full_path(&target.name);
            for (term_index, element) in target.terms.iter().enumerate() {
                let Some(value) = element_to_annotation(element, &aliases) else {
                    continue;
                };
                report_unknown_term(vocabularies, &value.term);
                let occurrence = SchemaAnnotation {
                    uri: file.uri.clone(),
                    pointer: Pointer::root()
                        .child("targets")
                        .child(target_index)
                        .child("terms")
                        .child(term_index),
                    value,
                    element: element.clone(),
                };
                let entry = schema
                    .targets
                    .entry(target_name.clone())
                    .or_insert_with(|| SchemaTarget {
                        name: target_name.clone(),
                        annotations: Vec::new(),
                    });
                let existing = entry.annotations.iter_mut().find(|a| {
                    a.value.term == occurrence.value.term
                        && a.value.qualifier == occurrence.value.qualifier
                        && a.uri != occurrence.uri
                });
                match existing {
                    Some(canonical) if split => merge_occurrence(canonical, occurrence, &mut merge_maps),
                    _ => entry.annotations.push(occurrence),
                }
            }
        }
    }
    (schema, merge_maps)
}

fn report_unknown_term(vocabularies: &VocabularyService, term: &str) {
    let Some((namespace, _)) = term.rsplit_once('.') else {
        return;
    };
    if vocabularies.is_vocabulary(namespace) && vocabularies.term(term).is_none() {
        tracing::debug!("Term '{}' is not known to the vocabulary service", term);
    }
}

fn merge_occurrence(
    canonical: &mut SchemaAnnotation,
    occurrence: SchemaAnnotation,
    merge_maps: &mut FileMergeMaps,
) {
    tracing::debug!(
        "Merging '{}' from '{}' into '{}'",
        occurrence.value.term,
        occurrence.uri,
        canonical.uri
    );
    let map = merge_maps.entry(canonical.uri.clone()).or_default();
    let records = record_child(&canonical.element).zip(record_child(&occurrence.element));
    let Some(((canonical_record, _), (record_index, record))) = records else {
        // later occurrences replace non-record values
        map.insert(
            canonical.pointer.clone(),
            PhysicalLocation {
                uri: occurrence.uri.clone(),
                pointer: occurrence.pointer.clone(),
            },
        );
        canonical.element = occurrence.element;
        canonical.value = occurrence.value;
        return;
    };

    let record = record.clone();
    let merged_record = canonical_record;
    for (index, node) in record.content.iter().enumerate() {
        let Some(property) = node.as_element() else {
            continue;
        };
        if property.name != names::PROPERTY_VALUE {
            continue;
        }
        let Some(target_record) = canonical
            .element
            .content
            .get_mut(merged_record)
            .and_then(Node::as_element_mut)
        else {
            return;
        };
        let name = property.attribute(names::PROPERTY);
        let existing = target_record.content.iter().position(|n| {
            n.as_element()
                .is_some_and(|e| e.name == names::PROPERTY_VALUE && e.attribute(names::PROPERTY) == name)
        });
        let merged_index = match existing {
            Some(position) => {
                target_record.content[position] = node.clone();
                position
            }
            None => {
                target_record.content.push(node.clone());
                target_record.content.len() - 1
            }
        };
        map.insert(
            canonical
                .pointer
                .child("content")
                .child(merged_record)
                .child("content")
                .child(merged_index),
            PhysicalLocation {
                uri: occurrence.uri.clone(),
                pointer: occurrence
                    .pointer
                    .child("content")
                    .child(record_index)
                    .child("content")
                    .child(index),
            },
        );
    }

    if let (Some(Expression::Record(merged)), Some(Expression::Record(addition))) =
        (canonical.value.value.as_mut(), occurrence.value.value)
    {
        for property in addition.property_values {
            match merged.property_values.iter_mut().find(|p| p.name == property.name) {
                Some(existing) => *existing = property,
                None => merged.property_values.push(property),
            }
        }
    }
}

fn record_child(element: &Element) -> Option<(usize, &Element)> {
    element
        .expression_child()
        .filter(|(_, child)| child.name == names::RECORD)
}
