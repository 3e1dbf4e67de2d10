//! Generic element -> AVT conversion, used to build the service schema

use super::{Apply, Expression, PropertyValue, RawAnnotation, Record};
use crate::alias::AliasInformation;
use crate::model::{Element, names};

/// Read an `Annotation` element; names are expanded to full namespaces
pub fn element_to_annotation(element: &Element, aliases: &AliasInformation) -> Option<RawAnnotation> {
    if element.name != names::ANNOTATION {
        return None;
    }
    let term = element.attribute(names::TERM)?;
    Some(RawAnnotation {
        term: aliases.to_full_name(term),
        qualifier: element.attribute(names::QUALIFIER).map(str::to_string),
        value: holder_value(element, aliases),
        annotations: nested_annotations(element, aliases),
    })
}

/// Value of an `Annotation` or `PropertyValue` element
pub fn holder_value(holder: &Element, aliases: &AliasInformation) -> Option<Expression> {
    if let Some(attribute) = holder.expression_attribute() {
        return Some(primitive(&attribute.name, &attribute.value, aliases));
    }
    holder
        .expression_child()
        .map(|(_, child)| element_to_expression(child, aliases))
}

pub fn element_to_expression(element: &Element, aliases: &AliasInformation) -> Expression {
    match element.name.as_str() {
        names::RECORD => Expression::Record(element_to_record(element, aliases)),
        names::COLLECTION => Expression::Collection(
            element
                .sub_elements()
                .map(|item| element_to_expression(item, aliases))
                .collect(),
        ),
        names::NULL => Expression::Null,
        names::APPLY => Expression::Apply(Apply {
            function: element.attribute(names::FUNCTION).unwrap_or_default().to_string(),
            parameters: element
                .sub_elements()
                .filter(|child| child.name != names::ANNOTATION)
                .map(|child| element_to_expression(child, aliases))
                .collect(),
        }),
        name if names::is_attribute_expression(name) => primitive(name, &element.text(), aliases),
        other => Expression::Unsupported(other.to_string()),
    }
}

pub fn element_to_record(element: &Element, aliases: &AliasInformation) -> Record {
    Record {
        type_name: element.attribute(names::TYPE).map(|t| aliases.to_full_name(t)),
        property_values: element
            .sub_elements()
            .filter(|child| child.name == names::PROPERTY_VALUE)
            .filter_map(|child| {
                Some(PropertyValue {
                    name: child.attribute(names::PROPERTY)?.to_string(),
                    value: holder_value(child, aliases).unwrap_or(Expression::Null),
                    annotations: nested_annotations(child, aliases),
                })
            })
            .collect(),
        annotations: nested_annotations(element, aliases),
    }
}

fn nested_annotations(element: &Element, aliases: &AliasInformation) -> Vec<RawAnnotation> {
    element
        .sub_elements()
        .filter_map(|child| element_to_annotation(child, aliases))
        .collect()
}

fn primitive(type_name: &str, text: &str, aliases: &AliasInformation) -> Expression {
    let text = text.to_string();
    match type_name {
        names::STRING => Expression::String(text),
        names::BOOL => Expression::Bool(text.trim() == "true"),
        names::INT => match text.trim().parse() {
            Ok(value) => Expression::Int(value),
            Err(_) => Expression::Decimal(text),
        },
        names::DECIMAL => Expression::Decimal(text),
        names::FLOAT => Expression::Float(text),
        names::DATE => Expression::Date(text),
        names::DATE_TIME_OFFSET => Expression::DateTimeOffset(text),
        names::TIME_OF_DAY => Expression::TimeOfDay(text),
        names::DURATION => Expression::Duration(text),
        names::GUID => Expression::Guid(text),
        names::BINARY => Expression::Binary(text),
        names::ENUM_MEMBER => Expression::EnumMember(aliases.to_full_enum_member(&text)),
        names::PATH => Expression::Path(text),
        names::PROPERTY_PATH => Expression::PropertyPath(text),
        names::NAVIGATION_PROPERTY_PATH => Expression::NavigationPropertyPath(text),
        names::ANNOTATION_PATH => Expression::AnnotationPath(text),
        names::MODEL_ELEMENT_PATH => Expression::ModelElementPath(aliases.to_full_path(&text)),
        other => Expression::Unsupported(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avt::to_generic::annotation_to_element;

    #[test]
    fn test_reads_back_converted_annotation() {
        let mut aliases = AliasInformation::new();
        aliases.add("com.sap.vocabularies.UI.v1", Some("UI"));
        let original = RawAnnotation::new("com.sap.vocabularies.UI.v1.LineItem")
            .with_qualifier("q")
            .with_value(Expression::Collection(vec![Expression::Record(
                Record::new(Some("com.sap.vocabularies.UI.v1.DataField"))
                    .with_property("Value", Expression::Path("name".into()))
                    .with_property(
                        "Importance",
                        Expression::EnumMember("com.sap.vocabularies.UI.v1.ImportanceType/High".into()),
                    ),
            )]));

        let element = annotation_to_element(&original, &aliases);
        let read = element_to_annotation(&element, &aliases).expect("annotation");

        assert_eq!(read, original);
    }

    #[test]
    fn test_unknown_elements_are_kept_by_name() {
        let aliases = AliasInformation::new();
        let element = Element::new("If");
        assert_eq!(
            element_to_expression(&element, &aliases),
            Expression::Unsupported("If".to_string())
        );
    }
}
