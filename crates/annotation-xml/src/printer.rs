//! Serialization of generic elements as XML text

use annotation_core::model::names;
use annotation_core::{Element, Target};
use quick_xml::escape::{escape, partial_escape};
use std::borrow::Cow;

/// Prints elements with a fixed indent unit and line ending
///
/// The first line of a printed element is not indented: it lands where the
/// caller places it. Nested lines start with `base` plus one indent unit per
/// level, and the closing tag with `base`.
#[derive(Debug, Clone, Copy)]
pub struct XmlPrinter<'a> {
    indent: &'a str,
    eol: &'a str,
}

impl<'a> XmlPrinter<'a> {
    pub fn new(indent: &'a str, eol: &'a str) -> Self {
        Self { indent, eol }
    }

    pub fn indent(&self) -> &'a str {
        self.indent
    }

    pub fn eol(&self) -> &'a str {
        self.eol
    }

    pub fn print_element(&self, element: &Element, base: &str) -> String {
        let mut out = String::new();
        self.write_element(&mut out, element, base);
        out
    }

    pub fn print_target(&self, target: &Target, base: &str) -> String {
        self.print_element(&target_element(target), base)
    }

    fn write_element(&self, out: &mut String, element: &Element, base: &str) {
        let name = element.qualified_name();
        out.push('<');
        out.push_str(&name);
        for attribute in element.attributes.values() {
            out.push(' ');
            out.push_str(&attribute.name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(&attribute.value));
            out.push('"');
        }
        if element.content.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if element.has_sub_elements() {
            let inner = format!("{base}{}", self.indent);
            for child in element.sub_elements() {
                out.push_str(self.eol);
                out.push_str(&inner);
                self.write_element(out, child, &inner);
            }
            out.push_str(self.eol);
            out.push_str(base);
        } else {
            out.push_str(&escape_text(&element.text()));
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

/// `Annotations` element of a target
pub fn target_element(target: &Target) -> Element {
    let mut element = Element::new(names::ANNOTATIONS).with_attribute(names::TARGET, &target.name);
    for term in &target.terms {
        element = element.with_child(term.clone());
    }
    element
}

pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    escape(value)
}

pub fn escape_text(text: &str) -> Cow<'_, str> {
    partial_escape(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn line_item() -> Element {
        Element::new(names::ANNOTATION)
            .with_attribute(names::TERM, "UI.LineItem")
            .with_child(
                Element::new(names::COLLECTION).with_child(
                    Element::new(names::RECORD)
                        .with_attribute(names::TYPE, "UI.DataField")
                        .with_child(
                            Element::new(names::PROPERTY_VALUE)
                                .with_attribute(names::PROPERTY, "Label")
                                .with_attribute(names::STRING, "Price & \"VAT\""),
                        ),
                ),
            )
    }

    #[test]
    fn test_print_nested_element() {
        let printed = XmlPrinter::new("    ", "\n").print_element(&line_item(), "");
        assert_snapshot!(printed, @r#"
<Annotation Term="UI.LineItem">
    <Collection>
        <Record Type="UI.DataField">
            <PropertyValue Property="Label" String="Price &amp; &quot;VAT&quot;"/>
        </Record>
    </Collection>
</Annotation>
"#);
    }

    #[test]
    fn test_print_target_with_base_indent() {
        let target = Target::new("svc.Books").with_terms(vec![
            Element::new(names::ANNOTATION)
                .with_attribute(names::TERM, "Common.Label")
                .with_child(Element::new(names::STRING).with_text("a < b")),
        ]);
        let printed = XmlPrinter::new("\t", "\r\n").print_target(&target, "\t");
        assert_eq!(
            printed,
            "<Annotations Target=\"svc.Books\">\r\n\t\t<Annotation Term=\"Common.Label\">\r\n\t\t\t<String>a &lt; b</String>\r\n\t\t</Annotation>\r\n\t</Annotations>"
        );
    }

    #[test]
    fn test_prefixed_element() {
        let include = Element::new(names::INCLUDE)
            .with_namespace(names::EDMX_PREFIX)
            .with_attribute(names::NAMESPACE, "Org.OData.Core.V1")
            .with_attribute(names::ALIAS, "Core");
        assert_eq!(
            XmlPrinter::new("  ", "\n").print_element(&include, ""),
            r#"<edmx:Include Namespace="Org.OData.Core.V1" Alias="Core"/>"#
        );
    }
}
