//! Formatting-preserving XML writer
//!
//! Collects [`XmlDocumentChange`]s against one parsed document and turns
//! them into minimal text edits. Unchanged regions keep their bytes,
//! inserted content follows the indentation of its neighbours.

mod children;

use crate::document::{SUB_ELEMENTS, XmlAttribute, XmlDocument, XmlElement};
use crate::printer::{XmlPrinter, escape_attribute, escape_text};
use annotation_core::{
    ApiError, Element, Node, OffsetEdit, Pointer, Result, TextEdit, XmlFormatOptions,
};
use children::{ChildEdits, Layout};
use indexmap::IndexMap;
use rowan::{TextRange, TextSize};
use std::collections::{HashMap, HashSet};

/// One edit of an XML document, addressed with XML pointers
#[derive(Debug, Clone, PartialEq)]
pub enum XmlDocumentChange {
    /// Insert a child element; `index` counts the original children
    InsertElement {
        pointer: Pointer,
        index: Option<usize>,
        element: Element,
    },
    DeleteElement {
        pointer: Pointer,
    },
    ReplaceElement {
        pointer: Pointer,
        element: Element,
    },
    ReplaceElementContent {
        pointer: Pointer,
        content: Vec<Node>,
    },
    UpdateElementName {
        pointer: Pointer,
        name: String,
    },
    InsertAttribute {
        pointer: Pointer,
        name: String,
        value: String,
    },
    UpdateAttributeValue {
        pointer: Pointer,
        value: String,
    },
    ReplaceAttribute {
        pointer: Pointer,
        name: String,
        value: String,
    },
    DeleteAttribute {
        pointer: Pointer,
    },
    /// Move children (possibly of another parent) into `pointer` at `index`
    MoveCollectionValue {
        pointer: Pointer,
        from_pointers: Vec<Pointer>,
        index: Option<usize>,
    },
    ReplaceText {
        pointer: Pointer,
        text: String,
    },
}

impl XmlDocumentChange {
    pub fn pointer(&self) -> &Pointer {
        match self {
            Self::InsertElement { pointer, .. }
            | Self::DeleteElement { pointer }
            | Self::ReplaceElement { pointer, .. }
            | Self::ReplaceElementContent { pointer, .. }
            | Self::UpdateElementName { pointer, .. }
            | Self::InsertAttribute { pointer, .. }
            | Self::UpdateAttributeValue { pointer, .. }
            | Self::ReplaceAttribute { pointer, .. }
            | Self::DeleteAttribute { pointer }
            | Self::MoveCollectionValue { pointer, .. }
            | Self::ReplaceText { pointer, .. } => pointer,
        }
    }
}

/// Content placed among the children of a parent
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Element(Element),
    /// Source text cut from elsewhere, with the indentation it had there
    Moved { text: String, indent: String },
}

/// Writer over one document snapshot
#[derive(Debug)]
pub struct XmlWriter<'a> {
    document: &'a XmlDocument,
    indent: String,
    eol: &'static str,
    changes: Vec<XmlDocumentChange>,
}

impl<'a> XmlWriter<'a> {
    pub fn new(document: &'a XmlDocument, options: &XmlFormatOptions) -> Self {
        let indent = detect_indent(document.text()).unwrap_or_else(|| options.indent.clone());
        Self {
            document,
            indent,
            eol: options.line_ending.resolve(document.text()),
            changes: Vec::new(),
        }
    }

    pub fn document(&self) -> &'a XmlDocument {
        self.document
    }

    pub fn add_change(&mut self, change: XmlDocumentChange) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Text edits for all collected changes, ready for [`annotation_core::apply_text_edits`]
    pub fn text_edits(&self) -> Result<Vec<TextEdit>> {
        let index = self.document.line_index();
        Ok(self
            .offset_edits()?
            .iter()
            .map(|edit| index.to_text_edit(edit))
            .collect())
    }

    /// Byte-offset edits, sorted and checked for overlaps
    pub fn offset_edits(&self) -> Result<Vec<OffsetEdit>> {
        let printer = XmlPrinter::new(&self.indent, self.eol);
        let mut parents: IndexMap<Pointer, ChildEdits> = IndexMap::new();
        let mut new_attributes: IndexMap<Pointer, Vec<(String, String)>> = IndexMap::new();
        let mut edits = Vec::new();

        let (changes, collapsed) = preprocess(self.changes.clone());
        for change in changes {
            match change {
                XmlDocumentChange::InsertElement { pointer, index, element } => {
                    parents
                        .entry(pointer)
                        .or_default()
                        .inserts
                        .push((index, Piece::Element(element)));
                }
                XmlDocumentChange::DeleteElement { pointer } => {
                    let (parent, index) = split_child(&pointer)?;
                    parents.entry(parent).or_default().deleted.insert(index);
                }
                XmlDocumentChange::MoveCollectionValue { pointer, from_pointers, index } => {
                    for (source, indices) in move_runs(&from_pointers)? {
                        let parent = self.element(&source)?;
                        if indices.iter().any(|&i| i >= parent.sub_elements.len()) {
                            return Err(ApiError::general(format!(
                                "Cannot move missing children of '{source}'"
                            )));
                        }
                        let (first, last) = (indices[0], indices[indices.len() - 1]);
                        let (text, indent) = Layout::new(self.document, parent).block(first, last);
                        parents.entry(source).or_default().moved.extend(indices);
                        parents
                            .entry(pointer.clone())
                            .or_default()
                            .inserts
                            .push((index, Piece::Moved { text, indent }));
                    }
                }
                XmlDocumentChange::ReplaceElement { pointer, element } => {
                    let old = self.element(&pointer)?;
                    let range = if collapsed.contains(&pointer) {
                        // replaces a deleted child: its comments go with it
                        let (parent, index) = split_child(&pointer)?;
                        Layout::new(self.document, self.element(&parent)?).block_range(index)
                    } else {
                        old.range
                    };
                    let indent = self.document.line_index().line_indent(range.start());
                    edits.push(OffsetEdit::replace(range, printer.print_element(&element, indent)));
                }
                XmlDocumentChange::ReplaceElementContent { pointer, content } => {
                    let element = self.element(&pointer)?;
                    edits.extend(self.replace_content(&printer, element, &content));
                }
                XmlDocumentChange::ReplaceText { pointer, text } => {
                    let element = self.element(&pointer)?;
                    edits.extend(replace_text(element, &text));
                }
                XmlDocumentChange::UpdateElementName { pointer, name } => {
                    let element = self.element(&pointer)?;
                    edits.push(OffsetEdit::replace(element.name_range, name.clone()));
                    if let Some(range) = element.close_name_range {
                        edits.push(OffsetEdit::replace(range, name));
                    }
                }
                XmlDocumentChange::InsertAttribute { pointer, name, value } => {
                    new_attributes.entry(pointer).or_default().push((name, value));
                }
                XmlDocumentChange::UpdateAttributeValue { pointer, value } => {
                    let (_, attribute) = self.attribute(&pointer)?;
                    edits.push(OffsetEdit::replace(
                        attribute.value_range,
                        escape_attribute(&value).into_owned(),
                    ));
                }
                XmlDocumentChange::ReplaceAttribute { pointer, name, value } => {
                    let (_, attribute) = self.attribute(&pointer)?;
                    edits.push(OffsetEdit::replace(attribute.name_range, name));
                    edits.push(OffsetEdit::replace(
                        attribute.value_range,
                        escape_attribute(&value).into_owned(),
                    ));
                }
                XmlDocumentChange::DeleteAttribute { pointer } => {
                    let (_, attribute) = self.attribute(&pointer)?;
                    let before = &self.document.text()[..usize::from(attribute.range.start())];
                    let start = TextSize::of(before.trim_end());
                    edits.push(OffsetEdit::delete(TextRange::new(start, attribute.range.end())));
                }
            }
        }

        for (pointer, attributes) in new_attributes {
            let element = self.element(&pointer)?;
            let text: String = attributes
                .iter()
                .map(|(name, value)| format!(" {name}=\"{}\"", escape_attribute(value)))
                .collect();
            edits.push(OffsetEdit::insert(element.attributes_end(), text));
        }
        for (pointer, child_edits) in &parents {
            let parent = self.element(pointer)?;
            edits.extend(children::child_edits(
                &Layout::new(self.document, parent),
                &printer,
                child_edits,
            )?);
        }

        sort_and_check(&mut edits, self.document)?;
        tracing::debug!(
            "{} change(s) produced {} edit(s) in {}",
            self.changes.len(),
            edits.len(),
            self.document.uri()
        );
        Ok(edits)
    }

    fn element(&self, pointer: &Pointer) -> Result<&'a XmlElement> {
        self.document.element_at(pointer).ok_or_else(|| {
            ApiError::general(format!("No element at '{pointer}' in '{}'", self.document.uri()))
        })
    }

    fn attribute(
        &self,
        pointer: &Pointer,
    ) -> Result<(&'a XmlElement, &'a XmlAttribute)> {
        self.document.attribute_at(pointer).ok_or_else(|| {
            ApiError::general(format!("No attribute at '{pointer}' in '{}'", self.document.uri()))
        })
    }

    fn replace_content(
        &self,
        printer: &XmlPrinter<'_>,
        element: &XmlElement,
        content: &[Node],
    ) -> Option<OffsetEdit> {
        let children: Vec<&Element> = content.iter().filter_map(Node::as_element).collect();
        if children.is_empty() {
            let text: String = content
                .iter()
                .filter_map(|node| match node {
                    Node::Text(text) => Some(text.text.as_str()),
                    Node::Element(_) => None,
                })
                .collect();
            if text.is_empty() {
                // no content left: self-closing form
                let close = element.close_tag?;
                let tag_end = element.open_tag.end() - TextSize::from(1);
                return Some(OffsetEdit::replace(TextRange::new(tag_end, close.end()), "/>"));
            }
            return replace_text(element, &text);
        }
        let outer = self.document.line_index().line_indent(element.range.start());
        let inner = format!("{outer}{}", self.indent);
        let mut body: String = children
            .iter()
            .map(|child| format!("{}{inner}{}", self.eol, printer.print_element(child, &inner)))
            .collect();
        body.push_str(self.eol);
        body.push_str(outer);
        Some(match element.content_range() {
            Some(range) => OffsetEdit::replace(range, body),
            None => OffsetEdit::replace(
                TextRange::new(element.attributes_end(), element.open_tag.end()),
                format!(">{body}</{}>", element.name),
            ),
        })
    }
}

fn replace_text(element: &XmlElement, text: &str) -> Option<OffsetEdit> {
    let escaped = escape_text(text);
    match element.content_range() {
        Some(range) => Some(OffsetEdit::replace(range, escaped.into_owned())),
        None if text.is_empty() => None,
        None => Some(OffsetEdit::replace(
            TextRange::new(element.attributes_end(), element.open_tag.end()),
            format!(">{escaped}</{}>", element.name),
        )),
    }
}

/// Indent unit of documents indented with tabs
pub(crate) fn detect_indent(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.starts_with([' ', '\t']) && line.trim_start().starts_with('<'))
        .filter(|line| line.starts_with('\t'))
        .map(|_| "\t".to_string())
}

/// `.../subElements/{index}` -> (parent, index)
fn split_child(pointer: &Pointer) -> Result<(Pointer, usize)> {
    let index = pointer.last_index();
    let marker = pointer.len().checked_sub(2).and_then(|i| pointer.get(i));
    match (pointer.ancestor(2), marker, index) {
        (Some(parent), Some(SUB_ELEMENTS), Some(index)) => Ok((parent, index)),
        _ => Err(ApiError::general(format!("'{pointer}' does not address a child element"))),
    }
}

/// Group move sources into runs of adjacent siblings, keeping their order
fn move_runs(from_pointers: &[Pointer]) -> Result<Vec<(Pointer, Vec<usize>)>> {
    let mut runs: Vec<(Pointer, Vec<usize>)> = Vec::new();
    for pointer in from_pointers {
        let (parent, index) = split_child(pointer)?;
        match runs.last_mut() {
            Some((run_parent, indices))
                if *run_parent == parent && indices.last().map(|last| last + 1) == Some(index) =>
            {
                indices.push(index);
            }
            _ => runs.push((parent, vec![index])),
        }
    }
    Ok(runs)
}

/// Normalize a batch before computing edits
///
/// - duplicate deletes are dropped
/// - changes inside deleted or replaced elements are dropped
/// - a delete with exactly one insert at the same child index becomes a
///   replace; the returned set holds the pointers of those replaces
fn preprocess(changes: Vec<XmlDocumentChange>) -> (Vec<XmlDocumentChange>, HashSet<Pointer>) {
    let mut seen = HashSet::new();
    let changes: Vec<_> = changes
        .into_iter()
        .filter(|change| match change {
            XmlDocumentChange::DeleteElement { pointer } => seen.insert(pointer.clone()),
            _ => true,
        })
        .collect();

    let deleted: Vec<Pointer> = changes
        .iter()
        .filter_map(|change| match change {
            XmlDocumentChange::DeleteElement { pointer } => Some(pointer.clone()),
            _ => None,
        })
        .collect();
    let replaced: Vec<Pointer> = changes
        .iter()
        .filter_map(|change| match change {
            XmlDocumentChange::ReplaceElement { pointer, .. }
            | XmlDocumentChange::ReplaceElementContent { pointer, .. } => Some(pointer.clone()),
            _ => None,
        })
        .collect();
    let changes: Vec<_> = changes
        .into_iter()
        .filter(|change| {
            let pointer = change.pointer();
            let inside_deleted = match change {
                XmlDocumentChange::DeleteElement { .. } => {
                    deleted.iter().any(|d| pointer.is_descendant_of(d))
                }
                _ => deleted.iter().any(|d| pointer.starts_with(d)),
            };
            !inside_deleted && !replaced.iter().any(|r| pointer.is_descendant_of(r))
        })
        .collect();

    let mut inserts_at: HashMap<Pointer, usize> = HashMap::new();
    for change in &changes {
        if let XmlDocumentChange::InsertElement { pointer, index: Some(index), .. } = change {
            *inserts_at.entry(pointer.child(SUB_ELEMENTS).child(index)).or_default() += 1;
        }
    }

    let mut result: Vec<XmlDocumentChange> = Vec::with_capacity(changes.len());
    let mut consumed: HashSet<Pointer> = HashSet::new();
    for change in &changes {
        if let XmlDocumentChange::InsertElement { pointer, index: Some(index), element } = change {
            let target = pointer.child(SUB_ELEMENTS).child(index);
            if deleted.contains(&target) && inserts_at.get(&target) == Some(&1) {
                consumed.insert(target.clone());
                result.push(XmlDocumentChange::ReplaceElement {
                    pointer: target,
                    element: element.clone(),
                });
                continue;
            }
        }
        result.push(change.clone());
    }
    result.retain(|change| match change {
        XmlDocumentChange::DeleteElement { pointer } => !consumed.contains(pointer),
        _ => true,
    });
    (result, consumed)
}

/// Sort by start with inserts first at equal offsets; overlaps are conflicts
pub(crate) fn sort_and_check(edits: &mut [OffsetEdit], document: &XmlDocument) -> Result<()> {
    edits.sort_by_key(|edit| (edit.range.start(), !edit.is_insertion()));
    for pair in edits.windows(2) {
        if pair[1].range.start() < pair[0].range.end() {
            let position = document.line_index().position(pair[1].range.start());
            return Err(ApiError::general(format!(
                "Conflicting changes in '{}' at line {}, character {}",
                document.uri(),
                position.line + 1,
                position.character + 1
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
