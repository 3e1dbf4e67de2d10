//! AVT -> generic element conversion
//!
//! Attribute-representable expressions (strings, booleans, numbers, dates,
//! guids, enum members and paths) become attributes of their holder
//! (`Annotation`, `PropertyValue`). `Null`, records, collections and dynamic
//! expressions always become child elements, and so does every collection
//! item.

use super::{Apply, Expression, PropertyValue, RawAnnotation, Record};
use crate::alias::AliasInformation;
use crate::model::{Element, Node, names};

/// Convert an annotation, aliasing its term with the file's aliases
pub fn annotation_to_element(annotation: &RawAnnotation, aliases: &AliasInformation) -> Element {
    let mut element = Element::new(names::ANNOTATION)
        .with_attribute(names::TERM, aliases.to_aliased_name(&annotation.term));
    if let Some(qualifier) = &annotation.qualifier {
        element.set_attribute(names::QUALIFIER, qualifier.clone());
    }
    for nested in &annotation.annotations {
        element
            .content
            .push(Node::Element(annotation_to_element(nested, aliases)));
    }
    if let Some(value) = &annotation.value {
        attach_value(&mut element, value, aliases);
    }
    element
}

pub fn property_value_to_element(property: &PropertyValue, aliases: &AliasInformation) -> Element {
    let mut element =
        Element::new(names::PROPERTY_VALUE).with_attribute(names::PROPERTY, property.name.clone());
    for nested in &property.annotations {
        element
            .content
            .push(Node::Element(annotation_to_element(nested, aliases)));
    }
    attach_value(&mut element, &property.value, aliases);
    element
}

pub fn record_to_element(record: &Record, aliases: &AliasInformation) -> Element {
    let mut element = Element::new(names::RECORD);
    if let Some(type_name) = &record.type_name {
        element.set_attribute(names::TYPE, aliases.to_aliased_name(type_name));
    }
    for nested in &record.annotations {
        element
            .content
            .push(Node::Element(annotation_to_element(nested, aliases)));
    }
    for property in &record.property_values {
        element
            .content
            .push(Node::Element(property_value_to_element(property, aliases)));
    }
    element
}

pub fn collection_to_element(items: &[Expression], aliases: &AliasInformation) -> Element {
    let mut element = Element::new(names::COLLECTION);
    for item in items {
        element
            .content
            .push(Node::Element(expression_to_element(item, aliases)));
    }
    element
}

/// Attribute notation of an expression, if it has one
pub fn expression_attribute(
    expression: &Expression,
    aliases: &AliasInformation,
) -> Option<(String, String)> {
    if !expression.has_attribute_notation() {
        return None;
    }
    Some((
        expression.type_name().to_string(),
        primitive_text(expression, aliases)?,
    ))
}

/// Element notation of any expression
pub fn expression_to_element(expression: &Expression, aliases: &AliasInformation) -> Element {
    match expression {
        Expression::Record(record) => record_to_element(record, aliases),
        Expression::Collection(items) => collection_to_element(items, aliases),
        Expression::Apply(apply) => apply_to_element(apply, aliases),
        Expression::Null => Element::new(names::NULL),
        Expression::Unsupported(name) => Element::new(name.clone()),
        other => {
            let text = primitive_text(other, aliases).unwrap_or_default();
            Element::new(other.type_name()).with_text(text)
        }
    }
}

/// Place a value on a holder element using attribute notation when possible
pub fn attach_value(holder: &mut Element, value: &Expression, aliases: &AliasInformation) {
    match expression_attribute(value, aliases) {
        Some((name, text)) => holder.set_attribute(name, text),
        None => holder
            .content
            .push(Node::Element(expression_to_element(value, aliases))),
    }
}

/// Text of a primitive expression as written in CSDL XML
pub fn primitive_text(expression: &Expression, aliases: &AliasInformation) -> Option<String> {
    let text = match expression {
        Expression::String(value)
        | Expression::Decimal(value)
        | Expression::Float(value)
        | Expression::Date(value)
        | Expression::DateTimeOffset(value)
        | Expression::TimeOfDay(value)
        | Expression::Duration(value)
        | Expression::Guid(value)
        | Expression::Binary(value)
        | Expression::Path(value)
        | Expression::PropertyPath(value)
        | Expression::NavigationPropertyPath(value) => value.clone(),
        Expression::Bool(value) => value.to_string(),
        Expression::Int(value) => value.to_string(),
        Expression::EnumMember(value) => aliases.to_aliased_enum_member(value),
        Expression::AnnotationPath(value) => aliases.to_aliased_annotation_path(value),
        Expression::ModelElementPath(value) => aliases.to_aliased_path(value),
        Expression::Null
        | Expression::Record(_)
        | Expression::Collection(_)
        | Expression::Apply(_)
        | Expression::Unsupported(_) => return None,
    };
    Some(text)
}

fn apply_to_element(apply: &Apply, aliases: &AliasInformation) -> Element {
    let mut element =
        Element::new(names::APPLY).with_attribute(names::FUNCTION, apply.function.clone());
    for parameter in &apply.parameters {
        element
            .content
            .push(Node::Element(expression_to_element(parameter, aliases)));
    }
    element
}
