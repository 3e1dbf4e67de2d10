//! Vocabulary references of annotation files
//!
//! After a batch of edits the `edmx:Reference` list must match the
//! vocabularies the file actually uses: references are added for newly used
//! vocabularies and removed for vocabularies the batch stopped using.
//! References that were already unused stay untouched.

use crate::annotation_file::XmlAnnotationFile;
use crate::document::XmlDocument;
use crate::writer::XmlDocumentChange;
use annotation_core::model::names;
use annotation_core::{AliasInformation, AnnotationFile, Element, VocabularyService};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Namespaces of all terms, types and enum members referenced by a file
pub fn used_namespaces(file: &AnnotationFile, aliases: &AliasInformation) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for target in &file.targets {
        for term in &target.terms {
            collect(term, aliases, &mut used);
        }
    }
    used
}

fn collect(element: &Element, aliases: &AliasInformation, used: &mut BTreeSet<String>) {
    let mut add = |name: &str| {
        if let Some((namespace, _)) = aliases.to_full_name(name).rsplit_once('.') {
            used.insert(namespace.to_string());
        }
    };
    for attribute in element.attributes.values() {
        if names::is_term_or_type_attribute(&attribute.name) {
            add(attribute.value.as_str());
        } else {
            for name in referenced_names(&attribute.name, &attribute.value) {
                add(name.as_str());
            }
        }
    }
    if !element.has_sub_elements() {
        for name in referenced_names(&element.name, &element.text()) {
            add(name.as_str());
        }
    }
    for child in element.sub_elements() {
        collect(child, aliases, used);
    }
}

/// Qualified names inside an enum member or path value
fn referenced_names(kind: &str, value: &str) -> Vec<String> {
    match kind {
        names::ENUM_MEMBER => value
            .split_whitespace()
            .filter_map(|member| member.split_once('/').map(|(ty, _)| ty.to_string()))
            .collect(),
        names::PATH
        | names::ANNOTATION_PATH
        | names::PROPERTY_PATH
        | names::NAVIGATION_PROPERTY_PATH
        | names::MODEL_ELEMENT_PATH => AliasInformation::annotation_path_terms(value),
        _ => Vec::new(),
    }
}

/// Changes on the original document that reconcile its reference list
pub fn reference_changes(
    document: &XmlDocument,
    derived: &XmlAnnotationFile,
    used_before: &BTreeSet<String>,
    used_after: &BTreeSet<String>,
    vocabularies: &VocabularyService,
) -> Vec<XmlDocumentChange> {
    let declared: BTreeSet<&str> = derived
        .file
        .references
        .iter()
        .map(|reference| reference.namespace.as_str())
        .collect();
    let own = derived.file.namespace.as_ref().map(|namespace| namespace.name.as_str());
    let mut changes = Vec::new();

    let root = document.root();
    let index = root
        .sub_elements
        .iter()
        .rposition(|element| element.local_name == names::REFERENCE)
        .map(|last| last + 1)
        .or_else(|| {
            root.sub_elements
                .iter()
                .position(|element| element.local_name == names::DATA_SERVICES)
        });
    for namespace in used_after {
        if declared.contains(namespace.as_str()) || Some(namespace.as_str()) == own {
            continue;
        }
        let Some(vocabulary) = vocabularies.by_namespace(namespace) else {
            continue;
        };
        tracing::debug!("Adding reference to {} in {}", namespace, document.uri());
        let mut include = Element::new(names::INCLUDE)
            .with_attribute(names::NAMESPACE, namespace.as_str())
            .with_attribute(names::ALIAS, vocabulary.default_alias.as_str());
        let mut reference =
            Element::new(names::REFERENCE).with_attribute(names::URI, vocabulary.uri.as_str());
        if let Some(prefix) = &root.prefix {
            include = include.with_namespace(prefix);
            reference = reference.with_namespace(prefix);
        }
        changes.push(XmlDocumentChange::InsertElement {
            pointer: XmlDocument::root_pointer(),
            index,
            element: reference.with_child(include),
        });
    }

    let mut unused: IndexMap<_, Vec<_>> = IndexMap::new();
    for location in &derived.references {
        let namespace = location.namespace.as_str();
        if used_before.contains(namespace)
            && !used_after.contains(namespace)
            && vocabularies.is_vocabulary(namespace)
        {
            unused.entry(&location.reference).or_default().push(location);
        }
    }
    for (reference, locations) in unused {
        tracing::debug!("Removing unused reference {} in {}", reference, document.uri());
        if locations.len() == locations[0].include_count {
            changes.push(XmlDocumentChange::DeleteElement {
                pointer: reference.clone(),
            });
        } else {
            changes.extend(locations.into_iter().map(|location| {
                XmlDocumentChange::DeleteElement {
                    pointer: location.include.clone(),
                }
            }));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation_core::MetadataSummary;

    const UI: &str = "com.sap.vocabularies.UI.v1";
    const COMMON: &str = "com.sap.vocabularies.Common.v1";

    fn parse(text: &str) -> (XmlDocument, XmlAnnotationFile) {
        let document = XmlDocument::parse("file:///a.xml", text).unwrap();
        let derived = XmlAnnotationFile::derive(&document);
        (document, derived)
    }

    fn used(derived: &XmlAnnotationFile) -> BTreeSet<String> {
        let aliases = AliasInformation::for_file(
            &derived.file,
            &MetadataSummary::default(),
            &VocabularyService::new(),
        );
        used_namespaces(&derived.file, &aliases)
    }

    const FILE: &str = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
    <edmx:Reference Uri="https://sap.github.io/odata-vocabularies/vocabularies/UI.xml">
        <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
    </edmx:Reference>
    <edmx:DataServices>
        <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="local">
            <Annotations Target="svc.Books">
                <Annotation Term="UI.Facets">
                    <Collection>
                        <Record Type="UI.ReferenceFacet">
                            <PropertyValue Property="Target" AnnotationPath="@Common.FieldGroup#Main"/>
                        </Record>
                    </Collection>
                </Annotation>
            </Annotations>
        </Schema>
    </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn test_used_namespaces_include_paths_and_types() {
        let (_, derived) = parse(FILE);
        let used = used(&derived);
        assert!(used.contains(UI));
        assert!(used.contains(COMMON));
        assert_eq!(used.len(), 2);
    }

    #[test]
    fn test_missing_reference_is_inserted_after_last_reference() {
        let (document, derived) = parse(FILE);
        let used = used(&derived);
        let changes = reference_changes(&document, &derived, &used, &used, &VocabularyService::new());
        assert_eq!(changes.len(), 1);
        let XmlDocumentChange::InsertElement { pointer, index, element } = &changes[0] else {
            panic!("expected insert, got {:?}", changes[0]);
        };
        assert_eq!(pointer.to_string(), "/rootElement");
        assert_eq!(*index, Some(1));
        assert_eq!(element.qualified_name(), "edmx:Reference");
        let include = element.sub_elements().next().unwrap();
        assert_eq!(include.attribute(names::NAMESPACE), Some(COMMON));
        assert_eq!(include.attribute(names::ALIAS), Some("Common"));
    }

    #[test]
    fn test_reference_removed_only_when_batch_stops_using_it() {
        let (document, derived) = parse(FILE);
        let before: BTreeSet<String> = [UI.to_string()].into();
        let after = BTreeSet::new();
        let changes = reference_changes(&document, &derived, &before, &after, &VocabularyService::new());
        assert_eq!(
            changes,
            vec![XmlDocumentChange::DeleteElement {
                pointer: annotation_core::Pointer::parse("/rootElement/subElements/0"),
            }]
        );

        let unchanged = reference_changes(&document, &derived, &after, &after, &VocabularyService::new());
        assert!(unchanged.is_empty());
    }
}
