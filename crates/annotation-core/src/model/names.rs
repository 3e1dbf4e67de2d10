//! Element and attribute names of the OData CSDL annotation vocabulary

pub const EDMX: &str = "Edmx";
pub const DATA_SERVICES: &str = "DataServices";
pub const REFERENCE: &str = "Reference";
pub const INCLUDE: &str = "Include";
pub const SCHEMA: &str = "Schema";
pub const ANNOTATIONS: &str = "Annotations";
pub const ANNOTATION: &str = "Annotation";
pub const RECORD: &str = "Record";
pub const PROPERTY_VALUE: &str = "PropertyValue";
pub const COLLECTION: &str = "Collection";
pub const NULL: &str = "Null";
pub const APPLY: &str = "Apply";

pub const EDMX_PREFIX: &str = "edmx";

pub const TERM: &str = "Term";
pub const QUALIFIER: &str = "Qualifier";
pub const TARGET: &str = "Target";
pub const PROPERTY: &str = "Property";
pub const TYPE: &str = "Type";
pub const FUNCTION: &str = "Function";
pub const NAMESPACE: &str = "Namespace";
pub const ALIAS: &str = "Alias";
pub const URI: &str = "Uri";
pub const VERSION: &str = "Version";

pub const STRING: &str = "String";
pub const BOOL: &str = "Bool";
pub const INT: &str = "Int";
pub const DECIMAL: &str = "Decimal";
pub const FLOAT: &str = "Float";
pub const DATE: &str = "Date";
pub const DATE_TIME_OFFSET: &str = "DateTimeOffset";
pub const TIME_OF_DAY: &str = "TimeOfDay";
pub const DURATION: &str = "Duration";
pub const GUID: &str = "Guid";
pub const BINARY: &str = "Binary";
pub const ENUM_MEMBER: &str = "EnumMember";
pub const PATH: &str = "Path";
pub const PROPERTY_PATH: &str = "PropertyPath";
pub const NAVIGATION_PROPERTY_PATH: &str = "NavigationPropertyPath";
pub const ANNOTATION_PATH: &str = "AnnotationPath";
pub const MODEL_ELEMENT_PATH: &str = "ModelElementPath";

/// Expression types that have an attribute notation on `Annotation` and `PropertyValue`
pub const ATTRIBUTE_EXPRESSIONS: &[&str] = &[
    STRING,
    BOOL,
    INT,
    DECIMAL,
    FLOAT,
    DATE,
    DATE_TIME_OFFSET,
    TIME_OF_DAY,
    DURATION,
    GUID,
    BINARY,
    ENUM_MEMBER,
    PATH,
    PROPERTY_PATH,
    NAVIGATION_PROPERTY_PATH,
    ANNOTATION_PATH,
    MODEL_ELEMENT_PATH,
];

/// Expression types that are only written as elements
pub const ELEMENT_EXPRESSIONS: &[&str] = &[RECORD, COLLECTION, NULL, APPLY];

pub fn is_attribute_expression(name: &str) -> bool {
    ATTRIBUTE_EXPRESSIONS.contains(&name)
}

/// Any element that denotes an expression value (as opposed to structure)
pub fn is_expression_element(name: &str) -> bool {
    is_attribute_expression(name) || ELEMENT_EXPRESSIONS.contains(&name)
}

/// Elements that carry a value either as attribute or as child expression
pub fn is_value_holder(name: &str) -> bool {
    name == ANNOTATION || name == PROPERTY_VALUE
}

/// Values referencing vocabulary terms or types inside attribute text
pub fn is_term_or_type_attribute(name: &str) -> bool {
    matches!(name, TERM | TYPE)
}
