//! Caller-facing change model
//!
//! Changes address annotations by [`AnnotationReference`] and a pointer
//! relative to the annotation's generic element. They carry AVT payloads and
//! know nothing about XML or CDS syntax.
//!
//! ```rust
//! use annotation_core::avt::Expression;
//! use annotation_core::change::{AnnotationReference, Change, UpdateContent};
//!
//! let reference = AnnotationReference::new("my.Service.Books", "com.sap.vocabularies.UI.v1.Hidden");
//! let change = Change::update(
//!     "file:///annotations.xml",
//!     reference,
//!     "",
//!     UpdateContent::Expression(Expression::Bool(false)),
//! );
//! assert_eq!(change.kind(), "update");
//! ```

use crate::avt::{Expression, PropertyValue, RawAnnotation, Record};
use crate::pointer::Pointer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one annotation: target path, full term name and qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationReference {
    pub target: String,
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl AnnotationReference {
    pub fn new(target: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            term: term.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// True when the reference names the given annotation
    pub fn matches(&self, target: &str, annotation: &RawAnnotation) -> bool {
        self.target == target && self.term == annotation.term && self.qualifier == annotation.qualifier
    }
}

impl fmt::Display for AnnotationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/@{}", self.target, self.term)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, "#{qualifier}")?;
        }
        Ok(())
    }
}

/// Payload of an insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum InsertContent {
    Expression(Expression),
    PropertyValue(PropertyValue),
    Record(Record),
    Collection(Vec<Expression>),
}

/// Payload of an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum UpdateContent {
    /// Replace the value at the pointer with a new expression
    Expression(Expression),
    /// Replace a plain value (attribute value or text) keeping its kind
    Primitive(String),
}

/// One caller edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Change {
    /// Add a new annotation to a target, creating the target when missing
    InsertAnnotation {
        uri: String,
        target: String,
        value: RawAnnotation,
    },
    /// Annotate an annotation, record or property value
    InsertEmbeddedAnnotation {
        uri: String,
        reference: AnnotationReference,
        #[serde(default)]
        pointer: Pointer,
        value: RawAnnotation,
    },
    Insert {
        uri: String,
        reference: AnnotationReference,
        #[serde(default)]
        pointer: Pointer,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        content: InsertContent,
    },
    Update {
        uri: String,
        reference: AnnotationReference,
        #[serde(default)]
        pointer: Pointer,
        content: UpdateContent,
    },
    Delete {
        uri: String,
        reference: AnnotationReference,
        #[serde(default)]
        pointer: Pointer,
    },
    /// Move elements to `index` of the container at `pointer`
    Move {
        uri: String,
        reference: AnnotationReference,
        #[serde(default)]
        pointer: Pointer,
        from_pointers: Vec<Pointer>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
}

impl Change {
    pub fn insert_annotation(uri: impl Into<String>, target: impl Into<String>, value: RawAnnotation) -> Self {
        Change::InsertAnnotation {
            uri: uri.into(),
            target: target.into(),
            value,
        }
    }

    pub fn insert_embedded_annotation(
        uri: impl Into<String>,
        reference: AnnotationReference,
        pointer: impl Into<Pointer>,
        value: RawAnnotation,
    ) -> Self {
        Change::InsertEmbeddedAnnotation {
            uri: uri.into(),
            reference,
            pointer: pointer.into(),
            value,
        }
    }

    pub fn insert(
        uri: impl Into<String>,
        reference: AnnotationReference,
        pointer: impl Into<Pointer>,
        index: Option<usize>,
        content: InsertContent,
    ) -> Self {
        Change::Insert {
            uri: uri.into(),
            reference,
            pointer: pointer.into(),
            index,
            content,
        }
    }

    pub fn update(
        uri: impl Into<String>,
        reference: AnnotationReference,
        pointer: impl Into<Pointer>,
        content: UpdateContent,
    ) -> Self {
        Change::Update {
            uri: uri.into(),
            reference,
            pointer: pointer.into(),
            content,
        }
    }

    pub fn delete(uri: impl Into<String>, reference: AnnotationReference, pointer: impl Into<Pointer>) -> Self {
        Change::Delete {
            uri: uri.into(),
            reference,
            pointer: pointer.into(),
        }
    }

    pub fn move_elements(
        uri: impl Into<String>,
        reference: AnnotationReference,
        pointer: impl Into<Pointer>,
        from_pointers: Vec<Pointer>,
        index: Option<usize>,
    ) -> Self {
        Change::Move {
            uri: uri.into(),
            reference,
            pointer: pointer.into(),
            from_pointers,
            index,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Change::InsertAnnotation { uri, .. }
            | Change::InsertEmbeddedAnnotation { uri, .. }
            | Change::Insert { uri, .. }
            | Change::Update { uri, .. }
            | Change::Delete { uri, .. }
            | Change::Move { uri, .. } => uri,
        }
    }

    /// Reference of the edited annotation; `None` for new annotations
    pub fn reference(&self) -> Option<&AnnotationReference> {
        match self {
            Change::InsertAnnotation { .. } => None,
            Change::InsertEmbeddedAnnotation { reference, .. }
            | Change::Insert { reference, .. }
            | Change::Update { reference, .. }
            | Change::Delete { reference, .. }
            | Change::Move { reference, .. } => Some(reference),
        }
    }

    pub fn pointer(&self) -> Option<&Pointer> {
        match self {
            Change::InsertAnnotation { .. } => None,
            Change::InsertEmbeddedAnnotation { pointer, .. }
            | Change::Insert { pointer, .. }
            | Change::Update { pointer, .. }
            | Change::Delete { pointer, .. }
            | Change::Move { pointer, .. } => Some(pointer),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Change::InsertAnnotation { .. } => "insert-annotation",
            Change::InsertEmbeddedAnnotation { .. } => "insert-embedded-annotation",
            Change::Insert { .. } => "insert",
            Change::Update { .. } => "update",
            Change::Delete { .. } => "delete",
            Change::Move { .. } => "move",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        let reference = AnnotationReference::new("Svc.Books", "com.sap.vocabularies.UI.v1.LineItem")
            .with_qualifier("q1");
        assert_eq!(
            reference.to_string(),
            "Svc.Books/@com.sap.vocabularies.UI.v1.LineItem#q1"
        );
    }

    #[test]
    fn test_change_json_shape() {
        let json = r#"{
            "kind": "insert",
            "uri": "file:///a.xml",
            "reference": {"target": "Svc.Books", "term": "com.sap.vocabularies.UI.v1.LineItem"},
            "pointer": "/content/0",
            "content": {"type": "Expression", "value": {"type": "Record", "value": {"type": "com.sap.vocabularies.UI.v1.DataField", "propertyValues": []}}}
        }"#;
        let change: Change = serde_json::from_str(json).unwrap();

        assert_eq!(change.kind(), "insert");
        assert_eq!(change.pointer().map(|p| p.to_string()).as_deref(), Some("/content/0"));
        let Change::Insert { index, .. } = &change else {
            panic!("expected insert");
        };
        assert_eq!(*index, None);

        let moved: Change = serde_json::from_str(
            r#"{"kind": "move", "uri": "u", "reference": {"target": "T", "term": "X"},
                "pointer": "/content/0", "fromPointers": ["/content/0/content/2"], "index": 0}"#,
        )
        .unwrap();
        assert!(matches!(moved, Change::Move { ref from_pointers, index: Some(0), .. } if from_pointers.len() == 1));
    }
}
