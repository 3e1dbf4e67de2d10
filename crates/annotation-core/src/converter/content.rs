//! Placement of AVT content into generic elements

use crate::alias::AliasInformation;
use crate::avt::to_generic::{
    annotation_to_element, collection_to_element, expression_attribute, expression_to_element,
    property_value_to_element, record_to_element,
};
use crate::avt::RawAnnotation;
use crate::change::InsertContent;
use crate::error::ApiError;
use crate::model::{Element, Node, names};
use crate::result::Result;

/// How new content lands on its parent element
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    Attribute { name: String, value: String },
    Element { index: Option<usize>, element: Element },
}

/// Decide the representation of inserted content
///
/// Value holders (`Annotation`, `PropertyValue`) without a value take
/// primitive values as attributes and everything else as an appended child.
/// Containers (records, collections, apply) take children at `index`.
pub fn plan_insert(
    parent: &Element,
    index: Option<usize>,
    content: &InsertContent,
    aliases: &AliasInformation,
) -> Result<Insertion> {
    let holder = names::is_value_holder(&parent.name);
    if holder && parent.has_value() {
        return Err(ApiError::general(format!(
            "'{}' already has a value, use an update instead",
            parent.name
        )));
    }
    let element = match content {
        InsertContent::Expression(expression) => {
            if holder {
                if let Some((name, value)) = expression_attribute(expression, aliases) {
                    return Ok(Insertion::Attribute { name, value });
                }
            }
            expression_to_element(expression, aliases)
        }
        InsertContent::PropertyValue(property) => {
            if parent.name != names::RECORD {
                return Err(ApiError::general(format!(
                    "Property value '{}' can only be inserted into a record, not '{}'",
                    property.name, parent.name
                )));
            }
            property_value_to_element(property, aliases)
        }
        InsertContent::Record(record) => record_to_element(record, aliases),
        InsertContent::Collection(items) => collection_to_element(items, aliases),
    };
    Ok(Insertion::Element {
        index: if holder { None } else { index },
        element,
    })
}

/// Apply an insertion to an in-memory element
pub fn apply_insertion(parent: &mut Element, insertion: Insertion) {
    match insertion {
        Insertion::Attribute { name, value } => parent.set_attribute(name, value),
        Insertion::Element { index, element } => parent.insert_child(index, Node::Element(element)),
    }
}

/// Element of an embedded annotation plus its index: after the annotations
/// already present at the start of the content
pub fn plan_embedded_annotation(
    parent: &Element,
    annotation: &RawAnnotation,
    aliases: &AliasInformation,
) -> (Option<usize>, Element) {
    let leading = parent
        .content
        .iter()
        .take_while(|node| node.as_element().is_some_and(|e| e.name == names::ANNOTATION))
        .count();
    let index = (leading < parent.content.len()).then_some(leading);
    (index, annotation_to_element(annotation, aliases))
}

/// Same element name and attribute values
pub fn same_shell(old: &Element, new: &Element) -> bool {
    old.name == new.name
        && old.attributes.len() == new.attributes.len()
        && old
            .attributes
            .iter()
            .all(|(name, attribute)| new.attribute(name) == Some(attribute.value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avt::{Expression, PropertyValue, Record};

    #[test]
    fn test_holder_takes_primitive_as_attribute() {
        let holder = Element::new(names::ANNOTATION).with_attribute(names::TERM, "UI.Hidden");
        let insertion = plan_insert(
            &holder,
            Some(3),
            &InsertContent::Expression(Expression::Bool(true)),
            &AliasInformation::new(),
        )
        .unwrap();
        assert_eq!(
            insertion,
            Insertion::Attribute {
                name: "Bool".to_string(),
                value: "true".to_string()
            }
        );
    }

    #[test]
    fn test_holder_with_value_rejects_insert() {
        let holder = Element::new(names::PROPERTY_VALUE)
            .with_attribute(names::PROPERTY, "Label")
            .with_attribute(names::STRING, "x");
        assert!(plan_insert(
            &holder,
            None,
            &InsertContent::Expression(Expression::Null),
            &AliasInformation::new()
        )
        .is_err());
    }

    #[test]
    fn test_property_values_need_a_record() {
        let aliases = AliasInformation::new();
        let property = InsertContent::PropertyValue(PropertyValue::new("Label", Expression::String("a".into())));
        assert!(plan_insert(&Element::new(names::COLLECTION), None, &property, &aliases).is_err());

        let mut record = Element::new(names::RECORD);
        let insertion = plan_insert(&record, Some(0), &property, &aliases).unwrap();
        apply_insertion(&mut record, insertion);
        assert_eq!(record.sub_elements().count(), 1);
    }

    #[test]
    fn test_collection_items_keep_index() {
        let collection = Element::new(names::COLLECTION)
            .with_child(Element::new(names::RECORD))
            .with_child(Element::new(names::RECORD));
        let insertion = plan_insert(
            &collection,
            Some(1),
            &InsertContent::Record(Record::new(None)),
            &AliasInformation::new(),
        )
        .unwrap();
        assert!(matches!(insertion, Insertion::Element { index: Some(1), .. }));
    }

    #[test]
    fn test_embedded_annotation_goes_after_leading_annotations() {
        let record = Element::new(names::RECORD)
            .with_child(Element::new(names::ANNOTATION))
            .with_child(Element::new(names::PROPERTY_VALUE));
        let (index, element) = plan_embedded_annotation(
            &record,
            &RawAnnotation::new("Core.Description"),
            &AliasInformation::new(),
        );
        assert_eq!(index, Some(1));
        assert_eq!(element.name, names::ANNOTATION);
    }
}
