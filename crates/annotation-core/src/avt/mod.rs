//! Annotation value tree (AVT)
//!
//! The logical, syntax-independent representation of annotation values that
//! callers build change payloads from. [`to_generic`] turns AVT values into
//! generic elements (choosing attribute or element notation), [`from_generic`]
//! reads them back for the service schema.

pub mod from_generic;
pub mod to_generic;

use crate::model::names;
use serde::{Deserialize, Serialize};

/// A term applied to a target, record or property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<RawAnnotation>,
}

/// Constant and dynamic expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Expression {
    String(String),
    Bool(bool),
    Int(i64),
    Decimal(String),
    Float(String),
    Date(String),
    DateTimeOffset(String),
    TimeOfDay(String),
    Duration(String),
    Guid(String),
    Binary(String),
    EnumMember(String),
    Path(String),
    PropertyPath(String),
    NavigationPropertyPath(String),
    AnnotationPath(String),
    ModelElementPath(String),
    Null,
    Record(Record),
    Collection(Vec<Expression>),
    Apply(Apply),
    /// An element this model does not interpret, kept by name
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub property_values: Vec<PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub name: String,
    pub value: Expression,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<RawAnnotation>,
}

/// Client-side function application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apply {
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<Expression>,
}

impl RawAnnotation {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            qualifier: None,
            value: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_value(mut self, value: Expression) -> Self {
        self.value = Some(value);
        self
    }
}

impl Record {
    pub fn new(type_name: Option<&str>) -> Self {
        Self {
            type_name: type_name.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Expression) -> Self {
        self.property_values.push(PropertyValue::new(name, value));
        self
    }
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: name.into(),
            value,
            annotations: Vec::new(),
        }
    }
}

impl Expression {
    /// CSDL name of the expression (element or attribute name)
    pub fn type_name(&self) -> &str {
        match self {
            Expression::String(_) => names::STRING,
            Expression::Bool(_) => names::BOOL,
            Expression::Int(_) => names::INT,
            Expression::Decimal(_) => names::DECIMAL,
            Expression::Float(_) => names::FLOAT,
            Expression::Date(_) => names::DATE,
            Expression::DateTimeOffset(_) => names::DATE_TIME_OFFSET,
            Expression::TimeOfDay(_) => names::TIME_OF_DAY,
            Expression::Duration(_) => names::DURATION,
            Expression::Guid(_) => names::GUID,
            Expression::Binary(_) => names::BINARY,
            Expression::EnumMember(_) => names::ENUM_MEMBER,
            Expression::Path(_) => names::PATH,
            Expression::PropertyPath(_) => names::PROPERTY_PATH,
            Expression::NavigationPropertyPath(_) => names::NAVIGATION_PROPERTY_PATH,
            Expression::AnnotationPath(_) => names::ANNOTATION_PATH,
            Expression::ModelElementPath(_) => names::MODEL_ELEMENT_PATH,
            Expression::Null => names::NULL,
            Expression::Record(_) => names::RECORD,
            Expression::Collection(_) => names::COLLECTION,
            Expression::Apply(_) => names::APPLY,
            Expression::Unsupported(name) => name,
        }
    }

    /// True when the value can be written as an attribute of its holder
    pub fn has_attribute_notation(&self) -> bool {
        names::is_attribute_expression(self.type_name()) && !matches!(self, Expression::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_notation_classification() {
        assert!(Expression::String("a".into()).has_attribute_notation());
        assert!(Expression::Path("a/b".into()).has_attribute_notation());
        assert!(Expression::Bool(true).has_attribute_notation());
        assert!(!Expression::Null.has_attribute_notation());
        assert!(!Expression::Record(Record::default()).has_attribute_notation());
        assert!(!Expression::Unsupported("String".into()).has_attribute_notation());
    }

    #[test]
    fn test_serde_shape() {
        let annotation = RawAnnotation::new("UI.LineItem").with_value(Expression::Collection(vec![
            Expression::Record(Record::new(Some("UI.DataField")).with_property(
                "Value",
                Expression::Path("name".into()),
            )),
        ]));
        let json = serde_json::to_value(&annotation).unwrap();

        assert_eq!(json["value"]["type"], "Collection");
        assert_eq!(json["value"]["value"][0]["value"]["type"], "UI.DataField");
        let back: RawAnnotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, annotation);
    }
}
