//! Generic annotation file view of an EDMX document

use crate::document::{ATTRIBUTES, SUB_ELEMENTS, TEXT_CONTENTS, XmlDocument, XmlElement};
use annotation_core::model::names;
use annotation_core::{
    AnnotationFile, Attribute, Element, MetadataSummary, Namespace, Node, Pointer, Reference,
    Target, TextNode,
};

/// XML location of one `edmx:Include`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    pub namespace: String,
    /// The enclosing `edmx:Reference`
    pub reference: Pointer,
    pub include: Pointer,
    /// Number of includes inside the enclosing reference
    pub include_count: usize,
}

/// An annotation file together with the XML locations needed to edit it
#[derive(Debug, Clone)]
pub struct XmlAnnotationFile {
    pub file: AnnotationFile,
    /// XML pointer of the `Annotations` element of every target
    pub target_pointers: Vec<Pointer>,
    /// First `Schema` element, where new targets go
    pub schema_pointer: Option<Pointer>,
    pub references: Vec<ReferenceLocation>,
}

impl XmlAnnotationFile {
    pub fn derive(document: &XmlDocument) -> Self {
        let root = document.root();
        let root_pointer = XmlDocument::root_pointer();
        let mut file = AnnotationFile::new(document.uri());
        file.range = Some(root.range);
        let mut derived = Self {
            file,
            target_pointers: Vec::new(),
            schema_pointer: None,
            references: Vec::new(),
        };

        for (i, child) in root.sub_elements.iter().enumerate() {
            let child_pointer = root_pointer.child(SUB_ELEMENTS).child(i);
            if child.local_name == names::REFERENCE {
                derived.add_reference(child, &child_pointer);
            } else if child.local_name == names::DATA_SERVICES {
                for (k, schema) in child.children_named(names::SCHEMA) {
                    let schema_pointer = child_pointer.child(SUB_ELEMENTS).child(k);
                    derived.add_schema(schema, &schema_pointer);
                }
            }
        }
        derived
    }

    fn add_reference(&mut self, reference: &XmlElement, pointer: &Pointer) {
        let uri = reference.attribute(names::URI).map(str::to_string);
        let includes: Vec<_> = reference.children_named(names::INCLUDE).collect();
        for (j, include) in &includes {
            let Some(namespace) = include.attribute(names::NAMESPACE) else {
                continue;
            };
            self.file.references.push(Reference {
                uri: uri.clone(),
                namespace: namespace.to_string(),
                alias: include.attribute(names::ALIAS).map(str::to_string),
                range: Some(include.range),
            });
            self.references.push(ReferenceLocation {
                namespace: namespace.to_string(),
                reference: pointer.clone(),
                include: pointer.child(SUB_ELEMENTS).child(j),
                include_count: includes.len(),
            });
        }
    }

    fn add_schema(&mut self, schema: &XmlElement, pointer: &Pointer) {
        if self.schema_pointer.is_none() {
            self.schema_pointer = Some(pointer.clone());
            self.file.namespace = schema.attribute(names::NAMESPACE).map(|name| Namespace {
                name: name.to_string(),
                alias: schema.attribute(names::ALIAS).map(str::to_string),
            });
        }
        for (m, annotations) in schema.children_named(names::ANNOTATIONS) {
            let target_attribute = annotations.attributes.get(names::TARGET);
            self.file.targets.push(Target {
                name: target_attribute.map(|a| a.value.clone()).unwrap_or_default(),
                terms: annotations.sub_elements.iter().map(to_generic_element).collect(),
                range: Some(annotations.range),
                name_range: target_attribute.map(|a| a.value_range),
                terms_range: annotations.content_range(),
            });
            self.target_pointers
                .push(pointer.child(SUB_ELEMENTS).child(m));
        }
    }

    /// Translate an absolute annotation file pointer into an XML pointer
    ///
    /// `targets/N` becomes the `Annotations` element, `terms/M` and element
    /// `content/K` become `subElements`, text content becomes
    /// `textContents/0` and `attributes/Name` becomes the attribute position.
    pub fn to_xml_pointer(&self, document: &XmlDocument, pointer: &Pointer) -> Option<Pointer> {
        let mut segments = pointer.segments().iter();
        if segments.next()? != "targets" {
            return None;
        }
        let target: usize = segments.next()?.parse().ok()?;
        let mut xml = self.target_pointers.get(target)?.clone();
        while let Some(segment) = segments.next() {
            match segment.as_str() {
                "terms" => {
                    let index: usize = segments.next()?.parse().ok()?;
                    xml = xml.child(SUB_ELEMENTS).child(index);
                }
                "content" => {
                    let index: usize = segments.next()?.parse().ok()?;
                    let element = document.element_at(&xml)?;
                    xml = if element.sub_elements.is_empty() && index == 0 {
                        xml.child(TEXT_CONTENTS).child(0)
                    } else {
                        xml.child(SUB_ELEMENTS).child(index)
                    };
                }
                "attributes" => {
                    let name = segments.next()?;
                    let position = document.element_at(&xml)?.attributes.get_index_of(name.as_str())?;
                    xml = xml.child(ATTRIBUTES).child(position);
                }
                "value" => {}
                _ => return None,
            }
        }
        Some(xml)
    }
}

/// Generic element for an XML element
///
/// Content holds every sub-element; text is kept only for leaf elements,
/// and whitespace-only text only for attribute-notation expressions.
pub fn to_generic_element(element: &XmlElement) -> Element {
    let attributes = element
        .attributes
        .values()
        .map(|attribute| {
            (
                attribute.name.clone(),
                Attribute {
                    name: attribute.name.clone(),
                    value: attribute.value.clone(),
                    name_range: Some(attribute.name_range),
                    value_range: Some(attribute.value_range),
                },
            )
        })
        .collect();
    let mut content: Vec<Node> = element
        .sub_elements
        .iter()
        .map(|child| Node::Element(to_generic_element(child)))
        .collect();
    if content.is_empty() && !element.text_contents.is_empty() {
        let text = element.text();
        if !text.trim().is_empty() || names::is_attribute_expression(&element.local_name) {
            content.push(Node::Text(TextNode {
                text,
                range: element.content_range(),
            }));
        }
    }
    Element {
        name: element.local_name.clone(),
        namespace: element.prefix.clone(),
        attributes,
        content,
        range: Some(element.range),
        name_range: Some(element.name_range),
        content_range: element.content_range(),
    }
}

/// Version and schema namespaces of a service metadata document
pub fn metadata_summary(document: &XmlDocument) -> MetadataSummary {
    let root = document.root();
    let namespaces = root
        .children_named(names::DATA_SERVICES)
        .flat_map(|(_, services)| services.children_named(names::SCHEMA))
        .filter_map(|(_, schema)| {
            schema.attribute(names::NAMESPACE).map(|name| Namespace {
                name: name.to_string(),
                alias: schema.attribute(names::ALIAS).map(str::to_string),
            })
        })
        .collect();
    MetadataSummary {
        uri: Some(document.uri().to_string()),
        odata_version: root.attribute(names::VERSION).map(str::to_string),
        namespaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
    <edmx:Reference Uri="https://sap.github.io/odata-vocabularies/vocabularies/UI.xml">
        <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
    </edmx:Reference>
    <edmx:DataServices>
        <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="local">
            <Annotations Target="svc.Books">
                <Annotation Term="UI.LineItem">
                    <Collection>
                        <Record Type="UI.DataField">
                            <PropertyValue Property="Value" Path="title"/>
                        </Record>
                    </Collection>
                </Annotation>
                <Annotation Term="UI.Identification">
                    <String>  </String>
                </Annotation>
            </Annotations>
        </Schema>
    </edmx:DataServices>
</edmx:Edmx>
"#;

    #[test]
    fn test_derive_targets_and_references() {
        let document = XmlDocument::parse("file:///a.xml", ANNOTATIONS).unwrap();
        let derived = XmlAnnotationFile::derive(&document);
        let file = &derived.file;

        assert_eq!(file.namespace.as_ref().map(|n| n.name.as_str()), Some("local"));
        assert_eq!(file.references.len(), 1);
        assert_eq!(file.references[0].alias.as_deref(), Some("UI"));
        assert_eq!(
            derived.references[0].include.to_string(),
            "/rootElement/subElements/0/subElements/0"
        );
        assert_eq!(file.targets.len(), 1);
        assert_eq!(file.targets[0].name, "svc.Books");
        assert_eq!(
            derived.target_pointers[0].to_string(),
            "/rootElement/subElements/1/subElements/0/subElements/0"
        );
        let line_item = &file.targets[0].terms[0];
        assert_eq!(line_item.attribute(names::TERM), Some("UI.LineItem"));
        // whitespace between elements is not content
        assert_eq!(line_item.content.len(), 1);
        let string = file.targets[0].terms[1].sub_elements().next().unwrap();
        assert_eq!(string.text(), "  ");
    }

    #[test]
    fn test_generic_pointers_map_to_xml() {
        let document = XmlDocument::parse("file:///a.xml", ANNOTATIONS).unwrap();
        let derived = XmlAnnotationFile::derive(&document);
        let target = "/rootElement/subElements/1/subElements/0/subElements/0";

        let xml = derived
            .to_xml_pointer(
                &document,
                &Pointer::parse("/targets/0/terms/0/content/0/content/0/content/0/attributes/Path"),
            )
            .unwrap();
        assert_eq!(
            xml.to_string(),
            format!("{target}/subElements/0/subElements/0/subElements/0/subElements/0/attributes/1")
        );
        let text = derived
            .to_xml_pointer(&document, &Pointer::parse("/targets/0/terms/1/content/0/content/0"))
            .unwrap();
        assert_eq!(text.to_string(), format!("{target}/subElements/1/subElements/0/textContents/0"));
        assert!(derived
            .to_xml_pointer(&document, &Pointer::parse("/targets/3"))
            .is_none());
    }

    #[test]
    fn test_metadata_summary() {
        let text = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema Namespace="com.example.Service" Alias="svc"/>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let document = XmlDocument::parse("file:///metadata.xml", text).unwrap();
        let summary = metadata_summary(&document);
        assert_eq!(summary.odata_version.as_deref(), Some("4.0"));
        assert_eq!(summary.namespaces[0].alias.as_deref(), Some("svc"));
    }
}
