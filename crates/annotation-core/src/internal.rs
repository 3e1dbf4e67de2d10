//! Internal, syntax-agnostic file changes
//!
//! Produced by the change converter and consumed by source adapters. Every
//! pointer is absolute inside the file's generic [`AnnotationFile`]
//! (`/targets/0/terms/1/content/0`), so adapters can map it onto their own
//! concrete tree.
//!
//! [`AnnotationFile`]: crate::model::AnnotationFile

use crate::model::{Element, Node, Target};
use crate::pointer::Pointer;

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationFileChange {
    /// Create a new target together with its terms
    InsertTarget { uri: String, target: Target },
    /// Insert a child element under `pointer` (a target or an element)
    InsertElement {
        uri: String,
        pointer: Pointer,
        index: Option<usize>,
        element: Element,
    },
    /// Add an attribute to the element at `pointer`
    InsertAttribute {
        uri: String,
        pointer: Pointer,
        name: String,
        value: String,
    },
    /// `pointer` addresses the attribute (`.../attributes/<name>`)
    UpdateAttributeValue {
        uri: String,
        pointer: Pointer,
        value: String,
    },
    ReplaceElement {
        uri: String,
        pointer: Pointer,
        element: Element,
    },
    /// Replace all children of the element at `pointer`
    ReplaceElementContent {
        uri: String,
        pointer: Pointer,
        content: Vec<Node>,
    },
    /// Rename the attribute at `pointer` and set its value
    ReplaceAttribute {
        uri: String,
        pointer: Pointer,
        name: String,
        value: String,
    },
    DeleteElement { uri: String, pointer: Pointer },
    DeleteAttribute { uri: String, pointer: Pointer },
    /// Move children into the container at `pointer`
    MoveElements {
        uri: String,
        pointer: Pointer,
        from_pointers: Vec<Pointer>,
        index: Option<usize>,
    },
    /// Replace the text of the leaf element at `pointer`
    ReplaceText {
        uri: String,
        pointer: Pointer,
        text: String,
    },
}

impl AnnotationFileChange {
    pub fn uri(&self) -> &str {
        match self {
            AnnotationFileChange::InsertTarget { uri, .. }
            | AnnotationFileChange::InsertElement { uri, .. }
            | AnnotationFileChange::InsertAttribute { uri, .. }
            | AnnotationFileChange::UpdateAttributeValue { uri, .. }
            | AnnotationFileChange::ReplaceElement { uri, .. }
            | AnnotationFileChange::ReplaceElementContent { uri, .. }
            | AnnotationFileChange::ReplaceAttribute { uri, .. }
            | AnnotationFileChange::DeleteElement { uri, .. }
            | AnnotationFileChange::DeleteAttribute { uri, .. }
            | AnnotationFileChange::MoveElements { uri, .. }
            | AnnotationFileChange::ReplaceText { uri, .. } => uri,
        }
    }

    /// Addressed node; `None` for target inserts
    pub fn pointer(&self) -> Option<&Pointer> {
        match self {
            AnnotationFileChange::InsertTarget { .. } => None,
            AnnotationFileChange::InsertElement { pointer, .. }
            | AnnotationFileChange::InsertAttribute { pointer, .. }
            | AnnotationFileChange::UpdateAttributeValue { pointer, .. }
            | AnnotationFileChange::ReplaceElement { pointer, .. }
            | AnnotationFileChange::ReplaceElementContent { pointer, .. }
            | AnnotationFileChange::ReplaceAttribute { pointer, .. }
            | AnnotationFileChange::DeleteElement { pointer, .. }
            | AnnotationFileChange::DeleteAttribute { pointer, .. }
            | AnnotationFileChange::MoveElements { pointer, .. }
            | AnnotationFileChange::ReplaceText { pointer, .. } => Some(pointer),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnnotationFileChange::InsertTarget { .. } => "insert-target",
            AnnotationFileChange::InsertElement { .. } => "insert-element",
            AnnotationFileChange::InsertAttribute { .. } => "insert-attribute",
            AnnotationFileChange::UpdateAttributeValue { .. } => "update-attribute-value",
            AnnotationFileChange::ReplaceElement { .. } => "replace-element",
            AnnotationFileChange::ReplaceElementContent { .. } => "replace-element-content",
            AnnotationFileChange::ReplaceAttribute { .. } => "replace-attribute",
            AnnotationFileChange::DeleteElement { .. } => "delete-element",
            AnnotationFileChange::DeleteAttribute { .. } => "delete-attribute",
            AnnotationFileChange::MoveElements { .. } => "move-elements",
            AnnotationFileChange::ReplaceText { .. } => "replace-text",
        }
    }
}
