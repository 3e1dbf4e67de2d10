//! Reader for the CDS annotation subset used in tests, and a compiler built
//! on it
//!
//! Understands `using ...;` and `annotate <name> with @( ... );` with string,
//! number, boolean, `null`, enum, path, collection and record values.

use crate::adapter::relative_path;
use crate::compiler::{CdsCompilation, CdsCompiler, CompilerMessage};
use annotation_core::model::names;
use annotation_core::{
    AnnotationFile, Attribute, Element, FileCache, Node, Result, Target, TextNode,
};
use async_trait::async_trait;
use rowan::{TextRange, TextSize};

pub(crate) fn parse_cds(uri: &str, text: &str) -> AnnotationFile {
    let mut parser = Parser { text, pos: 0 };
    let mut file = AnnotationFile::new(uri);
    loop {
        parser.skip_ws();
        if parser.pos >= text.len() {
            break;
        }
        if parser.rest().starts_with("using") {
            let end = parser.rest().find(';').expect("terminated using");
            parser.pos += end + 1;
        } else {
            file.targets.push(parser.target());
        }
    }
    file.range = Some(parser.range(0, text.len()));
    file
}

/// Compiles with [`parse_cds`]; sources containing `!!` fail with a syntax
/// error
pub(crate) struct TestCompiler;

#[async_trait]
impl CdsCompiler for TestCompiler {
    async fn compile(&self, project_root: &str, sources: &FileCache) -> Result<CdsCompilation> {
        let mut compilation = CdsCompilation::default();
        for (uri, text) in sources {
            if text.contains("!!") {
                compilation.messages.insert(
                    relative_path(project_root, uri),
                    CompilerMessage::syntax_error("Unexpected '!'"),
                );
                continue;
            }
            compilation.annotation_files.push(parse_cds(uri, text));
        }
        Ok(compilation)
    }
}

enum Value {
    Primitive(&'static str, String, TextRange),
    Element(Element),
}

enum Member {
    Type(Attribute),
    Child(Element),
}

struct Parser<'t> {
    text: &'t str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn range(&self, start: usize, end: usize) -> TextRange {
        TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32))
    }

    fn skip_ws(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if self.rest().starts_with("//") {
                self.pos += self.rest().find('\n').unwrap_or(self.rest().len());
            } else {
                return;
            }
        }
    }

    fn expect(&mut self, token: &str) {
        self.skip_ws();
        assert!(
            self.rest().starts_with(token),
            "expected '{token}' at {}: {:?}",
            self.pos,
            &self.rest()[..self.rest().len().min(20)]
        );
        self.pos += token.len();
    }

    fn ident(&mut self) -> (String, TextRange) {
        self.skip_ws();
        let start = self.pos;
        let length = self
            .rest()
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '$'))
            .unwrap_or(self.rest().len());
        assert!(length > 0, "expected identifier at {start}");
        self.pos += length;
        (self.text[start..self.pos].to_string(), self.range(start, self.pos))
    }

    /// Comma separated entries up to `close`; returns them with the offset
    /// of the closing delimiter
    fn list<T>(&mut self, close: char, mut entry: impl FnMut(&mut Self) -> T) -> (Vec<T>, usize) {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                let at = self.pos;
                self.pos += 1;
                return (entries, at);
            }
            entries.push(entry(self));
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }
    }

    fn target(&mut self) -> Target {
        let start = self.pos;
        self.expect("annotate");
        let (name, name_range) = self.ident();
        self.expect("with");
        self.expect("@(");
        let inner_start = self.pos;
        let (terms, close) = self.list(')', |parser| parser.annotation(false));
        self.expect(";");
        Target {
            name,
            terms,
            range: Some(self.range(start, self.pos)),
            name_range: Some(name_range),
            terms_range: Some(self.range(inner_start, close)),
        }
    }

    /// A term, or with `record` set an `![@Term] : value` record member
    fn annotation(&mut self, record: bool) -> Element {
        self.skip_ws();
        let start = self.pos;
        if record {
            self.expect("![@");
        }
        let (term, term_range) = self.ident();
        let mut element = Element::new(names::ANNOTATION);
        element.attributes.insert(names::TERM.to_string(), attribute(names::TERM, term, term_range));
        self.skip_ws();
        if self.peek() == Some('#') {
            self.pos += 1;
            let (qualifier, range) = self.ident();
            element
                .attributes
                .insert(names::QUALIFIER.to_string(), attribute(names::QUALIFIER, qualifier, range));
        }
        if record {
            self.expect("]");
        }
        let mut end = self.pos;
        self.skip_ws();
        if self.peek() == Some(':') {
            self.pos += 1;
            let value = self.value();
            attach(&mut element, value);
            end = self.pos;
        } else {
            self.pos = end;
        }
        element.range = Some(self.range(start, end));
        element
    }

    fn value(&mut self) -> Value {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some('\'') => {
                let mut text = String::new();
                let mut chars = self.rest().char_indices().skip(1).peekable();
                let mut end = None;
                while let Some((offset, ch)) = chars.next() {
                    if ch == '\'' {
                        if chars.peek().is_some_and(|(_, next)| *next == '\'') {
                            chars.next();
                            text.push('\'');
                            continue;
                        }
                        end = Some(offset + 1);
                        break;
                    }
                    text.push(ch);
                }
                self.pos += end.expect("terminated string");
                Value::Primitive(names::STRING, text, self.range(start, self.pos))
            }
            Some('[') => {
                self.pos += 1;
                let inner_start = self.pos;
                let (items, close) = self.list(']', |parser| parser.item());
                let mut collection = Element::new(names::COLLECTION);
                collection.content = items.into_iter().map(Node::Element).collect();
                collection.range = Some(self.range(start, self.pos));
                collection.content_range = Some(self.range(inner_start, close));
                Value::Element(collection)
            }
            Some('{') => {
                self.pos += 1;
                let inner_start = self.pos;
                let (members, close) = self.list('}', |parser| parser.member());
                let mut record = Element::new(names::RECORD);
                for member in members {
                    match member {
                        Member::Type(type_attribute) => {
                            record.attributes.insert(names::TYPE.to_string(), type_attribute);
                        }
                        Member::Child(child) => record.content.push(Node::Element(child)),
                    }
                }
                record.range = Some(self.range(start, self.pos));
                record.content_range = Some(self.range(inner_start, close));
                Value::Element(record)
            }
            Some('#') => {
                self.pos += 1;
                let (member, _) = self.ident();
                Value::Primitive(names::ENUM_MEMBER, member, self.range(start, self.pos))
            }
            Some(ch) if ch.is_ascii_digit() || ch == '-' => {
                let length = self
                    .rest()
                    .find(|ch: char| !(ch.is_ascii_digit() || ch == '.' || ch == '-'))
                    .unwrap_or(self.rest().len());
                self.pos += length;
                let text = self.text[start..self.pos].to_string();
                let kind = if text.contains('.') { names::DECIMAL } else { names::INT };
                Value::Primitive(kind, text, self.range(start, self.pos))
            }
            _ => {
                let (word, range) = self.ident();
                match word.as_str() {
                    "true" | "false" => Value::Primitive(names::BOOL, word, range),
                    "null" => {
                        let mut null = Element::new(names::NULL);
                        null.range = Some(range);
                        Value::Element(null)
                    }
                    _ => Value::Primitive(names::PATH, word, range),
                }
            }
        }
    }

    fn item(&mut self) -> Element {
        match self.value() {
            Value::Primitive(kind, text, range) => Element {
                name: kind.to_string(),
                content: vec![Node::Text(TextNode {
                    text,
                    range: Some(range),
                })],
                range: Some(range),
                content_range: Some(range),
                ..Default::default()
            },
            Value::Element(element) => element,
        }
    }

    fn member(&mut self) -> Member {
        self.skip_ws();
        let start = self.pos;
        if self.rest().starts_with("$Type") {
            self.pos += "$Type".len();
            let name_range = self.range(start, self.pos);
            self.expect(":");
            let Value::Primitive(_, text, value_range) = self.value() else {
                panic!("$Type must be a string");
            };
            return Member::Type(Attribute {
                name: names::TYPE.to_string(),
                value: text,
                name_range: Some(name_range),
                value_range: Some(value_range),
            });
        }
        if self.rest().starts_with("![@") {
            return Member::Child(self.annotation(true));
        }
        let (name, name_range) = self.ident();
        let mut property = Element::new(names::PROPERTY_VALUE);
        property
            .attributes
            .insert(names::PROPERTY.to_string(), attribute(names::PROPERTY, name, name_range));
        self.expect(":");
        let value = self.value();
        attach(&mut property, value);
        property.range = Some(self.range(start, self.pos));
        Member::Child(property)
    }
}

fn attribute(name: &str, value: String, range: TextRange) -> Attribute {
    Attribute {
        name: name.to_string(),
        value,
        name_range: Some(range),
        value_range: Some(range),
    }
}

fn attach(holder: &mut Element, value: Value) {
    match value {
        Value::Primitive(kind, text, range) => {
            holder.attributes.insert(kind.to_string(), attribute(kind, text, range));
        }
        Value::Element(element) => holder.content.push(Node::Element(element)),
    }
}

#[test]
fn test_reader_ranges() {
    let text = "annotate S.E with @(\n    UI.LineItem #A : [{ $Type : 'UI.DataField', Value : t }],\n    UI.Hidden\n);";
    let file = parse_cds("file:///a.cds", text);
    let target = &file.targets[0];
    assert_eq!(target.name, "S.E");
    assert_eq!(&text[target.range.unwrap()], text);
    assert_eq!(&text[target.terms_range.unwrap()], &text[20..text.len() - 2]);
    let line_item = &target.terms[0];
    assert_eq!(line_item.attribute(names::QUALIFIER), Some("A"));
    assert_eq!(
        &text[line_item.range.unwrap()],
        "UI.LineItem #A : [{ $Type : 'UI.DataField', Value : t }]"
    );
    let record = line_item.sub_elements().next().unwrap().sub_elements().next().unwrap();
    let type_attribute = &record.attributes[names::TYPE];
    assert_eq!(type_attribute.value, "UI.DataField");
    assert_eq!(&text[type_attribute.value_range.unwrap()], "'UI.DataField'");
    assert_eq!(&text[target.terms[1].range.unwrap()], "UI.Hidden");
}
