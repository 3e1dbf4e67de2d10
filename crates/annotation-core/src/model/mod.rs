//! Generic annotation file model
//!
//! This is the syntax-agnostic tree that every source adapter produces for
//! its files: an [`AnnotationFile`] holds references and targets, each
//! [`Target`] holds annotation terms as generic [`Element`]s. Internal changes
//! address nodes of this tree with absolute pointers such as
//! `/targets/0/terms/2/content/1/attributes/Path/value`.
//!
//! Element `content` holds child elements and, for leaf elements only, text
//! nodes. Comments never appear here; adapters keep them in their concrete
//! syntax trees.

pub mod names;

use crate::pointer::Pointer;
use indexmap::IndexMap;
use rowan::TextRange;

/// Namespace declared by a file's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub alias: Option<String>,
}

/// A vocabulary or service namespace import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: Option<String>,
    pub namespace: String,
    pub alias: Option<String>,
    pub range: Option<TextRange>,
}

/// One parsed annotation file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationFile {
    pub uri: String,
    pub namespace: Option<Namespace>,
    pub references: Vec<Reference>,
    pub targets: Vec<Target>,
    pub range: Option<TextRange>,
}

/// An annotation target with its terms
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub terms: Vec<Element>,
    pub range: Option<TextRange>,
    pub name_range: Option<TextRange>,
    pub terms_range: Option<TextRange>,
}

/// Child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(TextNode),
}

/// A generic element (annotation, record, property value, expression, ...)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    /// Namespace prefix as written (`edmx` for `edmx:Reference`)
    pub namespace: Option<String>,
    pub attributes: IndexMap<String, Attribute>,
    pub content: Vec<Node>,
    pub range: Option<TextRange>,
    pub name_range: Option<TextRange>,
    pub content_range: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub name_range: Option<TextRange>,
    pub value_range: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub range: Option<TextRange>,
}

/// Borrowed view of whatever a pointer addresses
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a AnnotationFile),
    Target(&'a Target),
    Element(&'a Element),
    Text(&'a TextNode),
    Attribute(&'a Attribute),
    AttributeValue(&'a Attribute),
}

impl<'a> NodeRef<'a> {
    pub fn as_element(&self) -> Option<&'a Element> {
        match self {
            NodeRef::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&'a Target> {
        match self {
            NodeRef::Target(target) => Some(target),
            _ => None,
        }
    }
}

impl AnnotationFile {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Resolve an absolute pointer (`/targets/..`) inside this file
    pub fn node_at(&self, pointer: &Pointer) -> Option<NodeRef<'_>> {
        walk(NodeRef::File(self), pointer.segments())
    }

    pub fn element_at(&self, pointer: &Pointer) -> Option<&Element> {
        self.node_at(pointer).and_then(|node| node.as_element())
    }
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: Vec::new(),
            range: None,
            name_range: None,
            terms_range: None,
        }
    }

    pub fn with_terms(mut self, terms: Vec<Element>) -> Self {
        self.terms = terms;
        self
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn range(&self) -> Option<TextRange> {
        match self {
            Node::Element(element) => element.range,
            Node::Text(text) => text.range,
        }
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>) -> Self {
        self.namespace = Some(prefix.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.content.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(Node::Text(TextNode {
            text: text.into(),
            range: None,
        }));
        self
    }

    /// Name as written in XML, including the namespace prefix
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.get_mut(&name) {
            Some(existing) => existing.value = value,
            None => {
                self.attributes.insert(
                    name.clone(),
                    Attribute {
                        name,
                        value,
                        name_range: None,
                        value_range: None,
                    },
                );
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|attr| attr.value.as_str())
    }

    /// Child elements, skipping text nodes
    pub fn sub_elements(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(Node::as_element)
    }

    /// Child elements together with their index in `content`
    pub fn indexed_sub_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.content
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.as_element().map(|element| (index, element)))
    }

    /// Concatenated text of the direct text nodes
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn has_sub_elements(&self) -> bool {
        self.content.iter().any(|node| matches!(node, Node::Element(_)))
    }

    /// The attribute holding an attribute-notation expression, if any
    pub fn expression_attribute(&self) -> Option<&Attribute> {
        self.attributes
            .values()
            .find(|attr| names::is_attribute_expression(&attr.name))
    }

    /// First child element denoting an expression value
    pub fn expression_child(&self) -> Option<(usize, &Element)> {
        self.indexed_sub_elements()
            .find(|(_, element)| names::is_expression_element(&element.name))
    }

    /// True for annotations and property values without any value yet
    pub fn has_value(&self) -> bool {
        self.expression_attribute().is_some() || self.expression_child().is_some()
    }

    /// Resolve a pointer relative to this element
    pub fn node_at(&self, pointer: &Pointer) -> Option<NodeRef<'_>> {
        walk(NodeRef::Element(self), pointer.segments())
    }

    /// Mutable lookup of a descendant element through `content` segments
    pub fn element_at_mut(&mut self, pointer: &Pointer) -> Option<&mut Element> {
        let mut current = self;
        let mut segments = pointer.segments().iter();
        while let Some(segment) = segments.next() {
            if segment != "content" {
                return None;
            }
            let index: usize = segments.next()?.parse().ok()?;
            current = current.content.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Insert a child at a content index, appending when out of bounds
    pub fn insert_child(&mut self, index: Option<usize>, node: Node) {
        match index {
            Some(index) if index < self.content.len() => self.content.insert(index, node),
            _ => self.content.push(node),
        }
    }
}

fn walk<'a>(start: NodeRef<'a>, segments: &[String]) -> Option<NodeRef<'a>> {
    let mut current = start;
    let mut iter = segments.iter();
    while let Some(segment) = iter.next() {
        current = match (current, segment.as_str()) {
            (NodeRef::File(file), "targets") => {
                let index: usize = iter.next()?.parse().ok()?;
                NodeRef::Target(file.targets.get(index)?)
            }
            (NodeRef::Target(target), "terms") => {
                let index: usize = iter.next()?.parse().ok()?;
                NodeRef::Element(target.terms.get(index)?)
            }
            (NodeRef::Element(element), "content") => {
                let index: usize = iter.next()?.parse().ok()?;
                match element.content.get(index)? {
                    Node::Element(child) => NodeRef::Element(child),
                    Node::Text(text) => NodeRef::Text(text),
                }
            }
            (NodeRef::Element(element), "attributes") => {
                let name = iter.next()?;
                NodeRef::Attribute(element.attributes.get(name.as_str())?)
            }
            (NodeRef::Attribute(attribute), "value") => NodeRef::AttributeValue(attribute),
            (NodeRef::Text(text), "text") => NodeRef::Text(text),
            _ => return None,
        };
    }
    Some(current)
}
