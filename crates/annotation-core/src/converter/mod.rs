//! Change converter
//!
//! Turns a batch of caller [`Change`]s into syntax-agnostic
//! [`AnnotationFileChange`]s. The whole batch is converted at once so that
//! changes addressing an annotation inserted earlier in the same batch can
//! be merged into that pending annotation instead of producing edits
//! against content that does not exist yet.
//!
//! Output order is fixed: `InsertTarget` changes for targets created by the
//! batch come first, followed by every other change in batch order.

mod content;
mod state;

pub use content::{Insertion, apply_insertion, plan_embedded_annotation, plan_insert, same_shell};
pub use state::ConversionState;

use crate::adapter::CompiledService;
use crate::alias::AliasInformation;
use crate::avt::to_generic::{annotation_to_element, expression_attribute, expression_to_element, primitive_text};
use crate::avt::{Expression, RawAnnotation};
use crate::change::{AnnotationReference, Change, InsertContent, UpdateContent};
use crate::error::ApiError;
use crate::internal::AnnotationFileChange;
use crate::model::{Element, Node, NodeRef, names};
use crate::pointer::Pointer;
use crate::resolver::{ResolvedLocation, find_target, resolve_change_location};
use crate::result::Result;
use crate::schema::{FileMergeMaps, ServiceSchema, ValueType};
use crate::vocabulary::VocabularyService;
use std::rc::Rc;

/// Read-only inputs of a conversion
#[derive(Clone, Copy)]
pub struct ConversionContext<'a> {
    pub service: &'a CompiledService,
    pub merge_maps: &'a FileMergeMaps,
    pub schema: &'a ServiceSchema,
    pub vocabularies: &'a VocabularyService,
}

/// Convert a batch of changes
pub fn convert(context: ConversionContext<'_>, changes: &[Change]) -> Result<Vec<AnnotationFileChange>> {
    ChangeConverter::new(context).convert(changes)
}

pub struct ChangeConverter<'a> {
    context: ConversionContext<'a>,
    state: ConversionState,
}

impl<'a> ChangeConverter<'a> {
    pub fn new(context: ConversionContext<'a>) -> Self {
        Self {
            context,
            state: ConversionState::new(),
        }
    }

    /// Consume the converter; its state never outlives one batch
    pub fn convert(mut self, changes: &[Change]) -> Result<Vec<AnnotationFileChange>> {
        for change in changes {
            tracing::trace!("Converting {} change for '{}'", change.kind(), change.uri());
            self.convert_change(change)?;
        }
        let output = self.state.finish();
        tracing::debug!(
            "Converted {} change(s) into {} internal change(s)",
            changes.len(),
            output.len()
        );
        Ok(output)
    }

    fn convert_change(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::InsertAnnotation { uri, target, value } => self.insert_annotation(uri, target, value),
            _ if change
                .reference()
                .is_some_and(|reference| self.state.has_pending(change.uri(), reference)) =>
            {
                self.merge_into_pending(change)
            }
            Change::InsertEmbeddedAnnotation {
                uri,
                reference,
                pointer,
                value,
            } => self.insert_embedded(uri, reference, pointer, value),
            Change::Insert {
                uri,
                reference,
                pointer,
                index,
                content,
            } => self.insert(uri, reference, pointer, *index, content),
            Change::Update {
                uri,
                reference,
                pointer,
                content,
            } => self.update(uri, reference, pointer, content),
            Change::Delete {
                uri,
                reference,
                pointer,
            } => self.delete(uri, reference, pointer),
            Change::Move {
                uri,
                reference,
                pointer,
                from_pointers,
                index,
            } => self.move_elements(uri, reference, pointer, from_pointers, *index),
        }
    }

    fn aliases(&mut self, uri: &str) -> Result<Rc<AliasInformation>> {
        if let Some(aliases) = self.state.cached_aliases(uri) {
            return Ok(aliases);
        }
        let file = self
            .context
            .service
            .file(uri)
            .ok_or_else(|| ApiError::general(format!("No annotation file found for '{uri}'")))?;
        let aliases = AliasInformation::for_file(file, &self.context.service.metadata, self.context.vocabularies);
        Ok(self.state.cache_aliases(uri, aliases))
    }

    fn insert_annotation(&mut self, uri: &str, target: &str, value: &RawAnnotation) -> Result<()> {
        let aliases = self.aliases(uri)?;
        let target = aliases.to_full_path(target);
        let element = annotation_to_element(value, &aliases);
        let reference = (value.term.as_str(), value.qualifier.as_deref());

        if !self.state.has_new_target(uri, &target) {
            let existing = self
                .context
                .service
                .file(uri)
                .and_then(|file| find_target(file, &target, &aliases))
                .map(|(index, _)| index);
            if let Some(index) = existing {
                let change = AnnotationFileChange::InsertElement {
                    uri: uri.to_string(),
                    pointer: Pointer::root().child("targets").child(index),
                    index: None,
                    element,
                };
                self.state.push_pending_insert(uri, &target, reference, change);
                return Ok(());
            }
            tracing::debug!("Target '{}' does not exist in '{}', creating it", target, uri);
        }
        let aliased = aliases.to_aliased_path(&target);
        self.state
            .add_to_new_target(uri, &target, || aliased, reference, element);
        Ok(())
    }

    fn merge_into_pending(&mut self, change: &Change) -> Result<()> {
        let uri = change.uri();
        let aliases = self.aliases(uri)?;
        let Some(reference) = change.reference() else {
            return Ok(());
        };
        let Some(annotation) = self.state.pending_element_mut(uri, reference) else {
            return Ok(());
        };
        match change {
            Change::Insert {
                pointer,
                index,
                content,
                ..
            } => {
                let parent = annotation
                    .element_at_mut(pointer)
                    .ok_or_else(|| pending_pointer_error(pointer, reference))?;
                let insertion = plan_insert(parent, *index, content, &aliases)?;
                apply_insertion(parent, insertion);
                Ok(())
            }
            Change::InsertEmbeddedAnnotation { pointer, value, .. } => {
                let parent = annotation
                    .element_at_mut(pointer)
                    .ok_or_else(|| pending_pointer_error(pointer, reference))?;
                let (index, element) = plan_embedded_annotation(parent, value, &aliases);
                parent.insert_child(index, Node::Element(element));
                Ok(())
            }
            other => Err(ApiError::general(format!(
                "Cannot apply '{}' to annotation '{reference}' inserted in the same batch",
                other.kind()
            ))),
        }
    }

    fn locate(&mut self, uri: &str, reference: &AnnotationReference, pointer: &Pointer) -> Result<ResolvedLocation> {
        let aliases = self.aliases(uri)?;
        resolve_change_location(
            self.context.service,
            self.context.merge_maps,
            &aliases,
            uri,
            reference,
            pointer,
        )
    }

    fn element_at(&self, location: &ResolvedLocation) -> Result<&'a Element> {
        self.node_at(location)?
            .and_then(|node| node.as_element())
            .ok_or_else(|| {
                ApiError::general(format!(
                    "No element at '{}' in '{}'",
                    location.pointer, location.uri
                ))
            })
    }

    fn node_at(&self, location: &ResolvedLocation) -> Result<Option<NodeRef<'a>>> {
        let file = self
            .context
            .service
            .file(&location.uri)
            .ok_or_else(|| ApiError::general(format!("No annotation file found for '{}'", location.uri)))?;
        Ok(file.node_at(&location.pointer))
    }

    fn insert(
        &mut self,
        uri: &str,
        reference: &AnnotationReference,
        pointer: &Pointer,
        index: Option<usize>,
        content: &InsertContent,
    ) -> Result<()> {
        let location = self.locate(uri, reference, pointer)?;
        self.insert_at(location, index, content)
    }

    fn insert_at(&mut self, location: ResolvedLocation, index: Option<usize>, content: &InsertContent) -> Result<()> {
        let aliases = self.aliases(&location.uri)?;
        let parent = self.element_at(&location)?;
        let change = match plan_insert(parent, index, content, &aliases)? {
            Insertion::Attribute { name, value } => AnnotationFileChange::InsertAttribute {
                uri: location.uri,
                pointer: location.pointer,
                name,
                value,
            },
            Insertion::Element { index, element } => AnnotationFileChange::InsertElement {
                uri: location.uri,
                pointer: location.pointer,
                index,
                element,
            },
        };
        self.state.push(change);
        Ok(())
    }

    fn insert_embedded(
        &mut self,
        uri: &str,
        reference: &AnnotationReference,
        pointer: &Pointer,
        value: &RawAnnotation,
    ) -> Result<()> {
        let location = self.locate(uri, reference, pointer)?;
        let aliases = self.aliases(&location.uri)?;
        let parent = self.element_at(&location)?;
        let (index, element) = plan_embedded_annotation(parent, value, &aliases);
        self.state.push(AnnotationFileChange::InsertElement {
            uri: location.uri,
            pointer: location.pointer,
            index,
            element,
        });
        Ok(())
    }

    fn update(
        &mut self,
        uri: &str,
        reference: &AnnotationReference,
        pointer: &Pointer,
        content: &UpdateContent,
    ) -> Result<()> {
        let location = self.locate(uri, reference, pointer)?;
        let previous = self.context.schema.value_type_at(reference, uri, pointer)?;
        let node = self.node_at(&location)?;
        if let (None, UpdateContent::Expression(expression)) = (node, content) {
            if let Some((owner, index)) = content_owner(&location.pointer) {
                // nothing there yet: insert into the owning element
                let owner = ResolvedLocation {
                    uri: location.uri,
                    pointer: owner,
                };
                return self.insert_at(owner, Some(index), &InsertContent::Expression(expression.clone()));
            }
        }
        let changes = match content {
            UpdateContent::Expression(expression) => {
                let aliases = self.aliases(&location.uri)?;
                update_expression(&location, node, previous, expression, &aliases)?
            }
            UpdateContent::Primitive(text) => update_primitive(&location, node, previous, text)?,
        };
        for change in changes {
            self.state.push(change);
        }
        Ok(())
    }

    fn delete(&mut self, uri: &str, reference: &AnnotationReference, pointer: &Pointer) -> Result<()> {
        let location = self.locate(uri, reference, pointer)?;
        let node = self.node_at(&location)?.ok_or_else(|| {
            ApiError::general(format!(
                "Nothing to delete at '{pointer}' in annotation '{reference}' of '{uri}'"
            ))
        })?;
        let change = match node {
            _ if location.pointer.attribute_name().is_some() => AnnotationFileChange::DeleteAttribute {
                pointer: location.pointer.without_value_suffix(),
                uri: location.uri,
            },
            NodeRef::Text(_) => AnnotationFileChange::ReplaceText {
                pointer: text_owner(&location.pointer)?,
                uri: location.uri,
                text: String::new(),
            },
            _ => AnnotationFileChange::DeleteElement {
                uri: location.uri,
                pointer: location.pointer,
            },
        };
        self.state.push(change);
        Ok(())
    }

    fn move_elements(
        &mut self,
        uri: &str,
        reference: &AnnotationReference,
        pointer: &Pointer,
        from_pointers: &[Pointer],
        index: Option<usize>,
    ) -> Result<()> {
        let destination = self.locate(uri, reference, pointer)?;
        self.element_at(&destination)?;
        let mut sources = Vec::with_capacity(from_pointers.len());
        for from in from_pointers {
            let source = self.locate(uri, reference, from)?;
            if source.uri != destination.uri {
                return Err(ApiError::general(format!(
                    "Cannot move '{from}' of annotation '{reference}' across files ('{}' to '{}')",
                    source.uri, destination.uri
                )));
            }
            self.element_at(&source)?;
            sources.push(source.pointer);
        }
        self.state.push(AnnotationFileChange::MoveElements {
            uri: destination.uri,
            pointer: destination.pointer,
            from_pointers: sources,
            index,
        });
        Ok(())
    }
}

fn pending_pointer_error(pointer: &Pointer, reference: &AnnotationReference) -> ApiError {
    ApiError::general(format!(
        "Pointer '{pointer}' does not address an element of annotation '{reference}' inserted in the same batch"
    ))
}

/// `.../content/<n>` -> (owner element, n)
fn content_owner(pointer: &Pointer) -> Option<(Pointer, usize)> {
    let index = pointer.last_index()?;
    let marker = pointer.len().checked_sub(2).and_then(|i| pointer.get(i))?;
    (marker == "content").then(|| pointer.ancestor(2)).flatten().map(|owner| (owner, index))
}

/// Element owning a text node pointer (`.../content/<n>`)
fn text_owner(pointer: &Pointer) -> Result<Pointer> {
    pointer
        .ancestor(2)
        .ok_or_else(|| ApiError::general(format!("'{pointer}' does not address a text node")))
}

fn update_expression(
    location: &ResolvedLocation,
    node: Option<NodeRef<'_>>,
    previous: Option<ValueType>,
    expression: &Expression,
    aliases: &AliasInformation,
) -> Result<Vec<AnnotationFileChange>> {
    let uri = location.uri.clone();
    let pointer = &location.pointer;
    let changes = match node {
        None => {
            // a missing attribute is created on its owner
            let owner = pointer
                .attribute_owner()
                .ok_or_else(|| ApiError::general(format!("Cannot resolve '{pointer}' in '{uri}'")))?;
            vec![insert_value_on(uri, owner, expression, aliases)]
        }
        Some(NodeRef::Element(element)) if names::is_value_holder(&element.name) => match previous {
            None => vec![insert_value_on(uri, pointer.clone(), expression, aliases)],
            Some(ValueType::Attribute(old)) => {
                let attribute = pointer.child("attributes").child(&old);
                update_attribute(uri, attribute, pointer.clone(), &old, expression, aliases)
            }
            Some(ValueType::Element(_)) => {
                let (index, child) = element.expression_child().ok_or_else(|| {
                    ApiError::general(format!("No value element under '{pointer}' in '{uri}'"))
                })?;
                let child_pointer = pointer.child("content").child(index);
                match expression_attribute(expression, aliases) {
                    Some((name, value)) => vec![
                        AnnotationFileChange::DeleteElement {
                            uri: uri.clone(),
                            pointer: child_pointer,
                        },
                        AnnotationFileChange::InsertAttribute {
                            uri,
                            pointer: pointer.clone(),
                            name,
                            value,
                        },
                    ],
                    None => vec![replace_element(uri, child_pointer, child, expression, aliases)],
                }
            }
            Some(ValueType::Text) => {
                return Err(ApiError::general(format!(
                    "Unexpected text value under '{pointer}' in '{uri}'"
                )));
            }
        },
        Some(NodeRef::Element(element)) => {
            vec![replace_element(uri, pointer.clone(), element, expression, aliases)]
        }
        Some(NodeRef::Attribute(attribute) | NodeRef::AttributeValue(attribute)) => {
            let owner = pointer
                .attribute_owner()
                .ok_or_else(|| ApiError::general(format!("Cannot resolve '{pointer}' in '{uri}'")))?;
            update_attribute(
                uri,
                pointer.without_value_suffix(),
                owner,
                &attribute.name,
                expression,
                aliases,
            )
        }
        Some(NodeRef::Text(_)) => {
            let text = primitive_text(expression, aliases).ok_or_else(|| {
                ApiError::general(format!(
                    "Cannot replace text at '{pointer}' with a {} value",
                    expression.type_name()
                ))
            })?;
            vec![AnnotationFileChange::ReplaceText {
                pointer: text_owner(pointer)?,
                uri,
                text,
            }]
        }
        Some(NodeRef::File(_) | NodeRef::Target(_)) => {
            return Err(ApiError::general(format!(
                "'{pointer}' in '{uri}' does not address an annotation value"
            )));
        }
    };
    Ok(changes)
}

fn update_attribute(
    uri: String,
    attribute: Pointer,
    owner: Pointer,
    old_name: &str,
    expression: &Expression,
    aliases: &AliasInformation,
) -> Vec<AnnotationFileChange> {
    match expression_attribute(expression, aliases) {
        Some((name, value)) if name == old_name => vec![AnnotationFileChange::UpdateAttributeValue {
            uri,
            pointer: attribute,
            value,
        }],
        Some((name, value)) => vec![AnnotationFileChange::ReplaceAttribute {
            uri,
            pointer: attribute,
            name,
            value,
        }],
        None => vec![
            AnnotationFileChange::DeleteAttribute {
                uri: uri.clone(),
                pointer: attribute,
            },
            AnnotationFileChange::InsertElement {
                uri,
                pointer: owner,
                index: None,
                element: expression_to_element(expression, aliases),
            },
        ],
    }
}

fn insert_value_on(
    uri: String,
    owner: Pointer,
    expression: &Expression,
    aliases: &AliasInformation,
) -> AnnotationFileChange {
    match expression_attribute(expression, aliases) {
        Some((name, value)) => AnnotationFileChange::InsertAttribute {
            uri,
            pointer: owner,
            name,
            value,
        },
        None => AnnotationFileChange::InsertElement {
            uri,
            pointer: owner,
            index: None,
            element: expression_to_element(expression, aliases),
        },
    }
}

/// Replace an expression element, keeping as much of it as possible
fn replace_element(
    uri: String,
    pointer: Pointer,
    old: &Element,
    expression: &Expression,
    aliases: &AliasInformation,
) -> AnnotationFileChange {
    let new = expression_to_element(expression, aliases);
    if !same_shell(old, &new) {
        return AnnotationFileChange::ReplaceElement {
            uri,
            pointer,
            element: new,
        };
    }
    if expression.has_attribute_notation() {
        return AnnotationFileChange::ReplaceText {
            uri,
            pointer,
            text: new.text(),
        };
    }
    AnnotationFileChange::ReplaceElementContent {
        uri,
        pointer,
        content: new.content,
    }
}

fn update_primitive(
    location: &ResolvedLocation,
    node: Option<NodeRef<'_>>,
    previous: Option<ValueType>,
    text: &str,
) -> Result<Vec<AnnotationFileChange>> {
    let uri = location.uri.clone();
    let pointer = &location.pointer;
    let no_value = || ApiError::general(format!("No value to update at '{pointer}' in '{uri}'"));
    let change = match node {
        Some(NodeRef::Attribute(_) | NodeRef::AttributeValue(_)) => AnnotationFileChange::UpdateAttributeValue {
            uri: uri.clone(),
            pointer: pointer.without_value_suffix(),
            value: text.to_string(),
        },
        Some(NodeRef::Text(_)) => AnnotationFileChange::ReplaceText {
            uri: uri.clone(),
            pointer: text_owner(pointer)?,
            text: text.to_string(),
        },
        Some(NodeRef::Element(element)) if names::is_value_holder(&element.name) => match previous {
            Some(ValueType::Attribute(name)) => AnnotationFileChange::UpdateAttributeValue {
                uri: uri.clone(),
                pointer: pointer.child("attributes").child(name),
                value: text.to_string(),
            },
            Some(ValueType::Element(_)) => {
                let (index, child) = element.expression_child().ok_or_else(no_value)?;
                if child.has_sub_elements() {
                    return Err(no_value());
                }
                AnnotationFileChange::ReplaceText {
                    uri: uri.clone(),
                    pointer: pointer.child("content").child(index),
                    text: text.to_string(),
                }
            }
            Some(ValueType::Text) | None => return Err(no_value()),
        },
        Some(NodeRef::Element(element)) if !element.has_sub_elements() => AnnotationFileChange::ReplaceText {
            uri: uri.clone(),
            pointer: pointer.clone(),
            text: text.to_string(),
        },
        _ => return Err(no_value()),
    };
    Ok(vec![change])
}

#[cfg(test)]
mod tests;
