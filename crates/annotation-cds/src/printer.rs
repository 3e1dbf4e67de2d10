//! Serialization of generic elements as CDS annotation values

use annotation_core::model::names;
use annotation_core::{ApiError, Element, Result, Target};

/// Prints annotation values in CDS syntax
///
/// Like the XML printer, the first line lands where the caller puts it and
/// nested lines start with `base` plus indent units. Records and
/// collections carry a trailing comma after every entry.
#[derive(Debug, Clone, Copy)]
pub struct CdsPrinter<'a> {
    indent: &'a str,
    eol: &'a str,
}

impl<'a> CdsPrinter<'a> {
    pub fn new(indent: &'a str, eol: &'a str) -> Self {
        Self { indent, eol }
    }

    pub fn indent(&self) -> &'a str {
        self.indent
    }

    pub fn eol(&self) -> &'a str {
        self.eol
    }

    /// `UI.LineItem #Main : [...]` as written inside `@( ... )`
    pub fn print_term(&self, term: &Element, base: &str) -> Result<String> {
        let name = term_name(term)?;
        if term.sub_elements().any(|child| child.name == names::ANNOTATION) {
            return Err(ApiError::general(format!(
                "Nested annotations of '{name}' cannot be written in CDS"
            )));
        }
        Ok(match self.print_holder_value(term, base)? {
            Some(value) => format!("{name} : {value}"),
            None => name,
        })
    }

    /// `Value : title` inside a record
    pub fn print_property_value(&self, property: &Element, base: &str) -> Result<String> {
        let name = property.attribute(names::PROPERTY).ok_or_else(|| {
            ApiError::general("Property value without Property attribute")
        })?;
        let value = self
            .print_holder_value(property, base)?
            .unwrap_or_else(|| "null".to_string());
        Ok(format!("{name} : {value}"))
    }

    /// Record member: a property value or an annotation of the record
    pub fn print_record_member(&self, member: &Element, base: &str) -> Result<String> {
        if member.name == names::ANNOTATION {
            let name = term_name(member)?;
            let value = self
                .print_holder_value(member, base)?
                .unwrap_or_else(|| "true".to_string());
            return Ok(format!("![@{name}] : {value}"));
        }
        self.print_property_value(member, base)
    }

    /// Value of an annotation or property value, `None` when it has none
    pub fn print_holder_value(&self, holder: &Element, base: &str) -> Result<Option<String>> {
        if let Some(attribute) = holder.expression_attribute() {
            return primitive(&attribute.name, &attribute.value).map(Some);
        }
        match holder.expression_child() {
            Some((_, child)) => self.print_value(child, base).map(Some),
            None => Ok(None),
        }
    }

    /// Expression element
    pub fn print_value(&self, element: &Element, base: &str) -> Result<String> {
        match element.name.as_str() {
            names::COLLECTION => {
                let items = element
                    .sub_elements()
                    .map(|item| {
                        let inner = self.nested(base);
                        self.print_value(item, &inner)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.block('[', ']', &items, base))
            }
            names::RECORD => {
                let inner = self.nested(base);
                let mut members = Vec::new();
                if let Some(type_name) = element.attribute(names::TYPE) {
                    members.push(format!("$Type : {}", string_literal(type_name)));
                }
                for member in element.sub_elements() {
                    members.push(self.print_record_member(member, &inner)?);
                }
                Ok(self.block('{', '}', &members, base))
            }
            names::NULL => Ok("null".to_string()),
            name if names::is_attribute_expression(name) => primitive(name, &element.text()),
            name => Err(ApiError::general(format!(
                "'{name}' expressions cannot be written in CDS"
            ))),
        }
    }

    /// Entry of the list an element is inserted into
    pub fn print_item(&self, element: &Element, list: ListKind, base: &str) -> Result<String> {
        match list {
            ListKind::Terms => self.print_term(element, base),
            ListKind::Record => self.print_record_member(element, base),
            ListKind::Collection => self.print_value(element, base),
        }
    }

    /// Complete `annotate` statement of a target
    ///
    /// Element targets (`Service.Books/title`) are written with the element
    /// block form.
    pub fn print_target(&self, target: &Target, base: &str) -> Result<String> {
        let (entity, element) = match target.name.split_once('/') {
            Some((entity, element)) => (entity, Some(element)),
            None => (target.name.as_str(), None),
        };
        let eol = self.eol;
        match element {
            None => {
                let terms = self.terms(target, base)?;
                Ok(format!("{base}annotate {entity} with @({terms}{eol}{base});"))
            }
            Some(element) => {
                let inner = self.nested(base);
                let terms = self.terms(target, &inner)?;
                Ok(format!(
                    "{base}annotate {entity} with {{{eol}{inner}{element} @({terms}{eol}{inner});{eol}{base}}};"
                ))
            }
        }
    }

    fn terms(&self, target: &Target, base: &str) -> Result<String> {
        let inner = self.nested(base);
        let printed = target
            .terms
            .iter()
            .map(|term| self.print_term(term, &inner))
            .collect::<Result<Vec<_>>>()?;
        let separator = format!(",{}{inner}", self.eol);
        Ok(format!("{}{inner}{}", self.eol, printed.join(&separator)))
    }

    fn block(&self, open: char, close: char, entries: &[String], base: &str) -> String {
        if entries.is_empty() {
            return format!("{open}{close}");
        }
        let inner = self.nested(base);
        let mut out = String::new();
        out.push(open);
        for entry in entries {
            out.push_str(self.eol);
            out.push_str(&inner);
            out.push_str(entry);
            out.push(',');
        }
        out.push_str(self.eol);
        out.push_str(base);
        out.push(close);
        out
    }

    fn nested(&self, base: &str) -> String {
        format!("{base}{}", self.indent)
    }
}

/// Kind of comma separated list an element lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Terms of a target inside `@( ... )`
    Terms,
    Collection,
    Record,
}

fn term_name(term: &Element) -> Result<String> {
    let name = term
        .attribute(names::TERM)
        .ok_or_else(|| ApiError::general("Annotation without Term attribute"))?;
    Ok(match term.attribute(names::QUALIFIER) {
        Some(qualifier) => format!("{name} #{qualifier}"),
        None => name.to_string(),
    })
}

/// CDS literal of an attribute-notation expression
pub fn primitive(kind: &str, text: &str) -> Result<String> {
    let literal = match kind {
        names::BOOL | names::INT | names::DECIMAL | names::FLOAT => text.trim().to_string(),
        names::STRING
        | names::DATE
        | names::DATE_TIME_OFFSET
        | names::TIME_OF_DAY
        | names::DURATION
        | names::GUID
        | names::BINARY
        | names::ANNOTATION_PATH
        | names::MODEL_ELEMENT_PATH => string_literal(text),
        names::PATH | names::PROPERTY_PATH | names::NAVIGATION_PROPERTY_PATH => path(text),
        names::ENUM_MEMBER => {
            let members: Vec<String> = text
                .split_whitespace()
                .map(|member| {
                    let short = member.rsplit_once('/').map_or(member, |(_, name)| name);
                    format!("#{short}")
                })
                .collect();
            match members.as_slice() {
                [single] => single.clone(),
                _ => format!("[{}]", members.join(", ")),
            }
        }
        other => {
            return Err(ApiError::general(format!(
                "'{other}' values cannot be written in CDS"
            )));
        }
    };
    Ok(literal)
}

/// CDS text for a new value of a named attribute
pub fn attribute_value(name: &str, value: &str) -> Result<String> {
    match name {
        names::TERM | names::QUALIFIER | names::PROPERTY => Ok(value.to_string()),
        names::TYPE => Ok(string_literal(value)),
        other => primitive(other, value),
    }
}

pub fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Paths use `.` between segments; anything else is written as a delimited
/// identifier
fn path(text: &str) -> String {
    let dotted = text.replace('/', ".");
    let plain = !dotted.is_empty()
        && dotted
            .split('.')
            .all(|segment| {
                segment
                    .chars()
                    .next()
                    .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
                    && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            });
    if plain {
        dotted
    } else {
        format!("![{text}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn printer() -> CdsPrinter<'static> {
        CdsPrinter::new("    ", "\n")
    }

    fn data_field(path: &str) -> Element {
        Element::new(names::RECORD)
            .with_attribute(names::TYPE, "UI.DataField")
            .with_child(
                Element::new(names::PROPERTY_VALUE)
                    .with_attribute(names::PROPERTY, "Value")
                    .with_attribute(names::PATH, path),
            )
    }

    #[test]
    fn test_primitives() {
        assert_eq!(primitive(names::STRING, "it's").unwrap(), "'it''s'");
        assert_eq!(primitive(names::BOOL, "true").unwrap(), "true");
        assert_eq!(primitive(names::PATH, "to_author/name").unwrap(), "to_author.name");
        assert_eq!(primitive(names::PATH, "@UI.LineItem").unwrap(), "![@UI.LineItem]");
        assert_eq!(
            primitive(names::ANNOTATION_PATH, "@UI.FieldGroup#Main").unwrap(),
            "'@UI.FieldGroup#Main'"
        );
        assert_eq!(
            primitive(names::ENUM_MEMBER, "UI.ImportanceType/High").unwrap(),
            "#High"
        );
        assert_eq!(
            primitive(names::ENUM_MEMBER, "Capabilities.Mode/Read Capabilities.Mode/Write").unwrap(),
            "[#Read, #Write]"
        );
        assert!(primitive(names::APPLY, "").is_err());
    }

    #[test]
    fn test_print_term_with_collection() {
        let term = Element::new(names::ANNOTATION)
            .with_attribute(names::TERM, "UI.LineItem")
            .with_attribute(names::QUALIFIER, "Main")
            .with_child(
                Element::new(names::COLLECTION)
                    .with_child(data_field("title"))
                    .with_child(Element::new(names::STRING).with_text("plain")),
            );
        assert_snapshot!(printer().print_term(&term, "    ").unwrap(), @r"
        UI.LineItem #Main : [
                {
                    $Type : 'UI.DataField',
                    Value : title,
                },
                'plain',
            ]
        ");
    }

    #[test]
    fn test_print_record_annotation_and_flags() {
        let record = data_field("price").with_child(
            Element::new(names::ANNOTATION)
                .with_attribute(names::TERM, "UI.Importance")
                .with_attribute(names::ENUM_MEMBER, "UI.ImportanceType/High"),
        );
        assert_eq!(
            printer().print_value(&record, "").unwrap(),
            "{\n    $Type : 'UI.DataField',\n    Value : price,\n    ![@UI.Importance] : #High,\n}"
        );
        let hidden = Element::new(names::ANNOTATION).with_attribute(names::TERM, "UI.Hidden");
        assert_eq!(printer().print_term(&hidden, "").unwrap(), "UI.Hidden");
        let empty = Element::new(names::ANNOTATION)
            .with_attribute(names::TERM, "UI.Facets")
            .with_child(Element::new(names::COLLECTION));
        assert_eq!(printer().print_term(&empty, "").unwrap(), "UI.Facets : []");
    }

    #[test]
    fn test_print_targets() {
        let label = Element::new(names::ANNOTATION)
            .with_attribute(names::TERM, "Common.Label")
            .with_attribute(names::STRING, "Title");
        let entity = Target::new("CatalogService.Books").with_terms(vec![label.clone(), label.clone()]);
        assert_snapshot!(printer().print_target(&entity, "").unwrap(), @r"
        annotate CatalogService.Books with @(
            Common.Label : 'Title',
            Common.Label : 'Title'
        );
        ");

        let element = Target::new("CatalogService.Books/title").with_terms(vec![label]);
        assert_snapshot!(printer().print_target(&element, "").unwrap(), @r"
        annotate CatalogService.Books with {
            title @(
                Common.Label : 'Title'
            );
        };
        ");
    }

    #[test]
    fn test_unsupported_expressions() {
        let term = Element::new(names::ANNOTATION)
            .with_attribute(names::TERM, "UI.Hidden")
            .with_child(Element::new(names::APPLY));
        assert!(printer().print_term(&term, "").is_err());
    }
}
