//! Position-preserving XML document model
//!
//! quick-xml drives tokenization and well-formedness checks. Offsets of tags,
//! attribute names and attribute values are recovered from the source text so
//! that edits can target exact ranges.
//!
//! Nodes are addressed with pointers of the form
//! `/rootElement/subElements/1/subElements/0`, `.../textContents/0` and
//! `.../attributes/2` (attribute position in document order).

use annotation_core::{ApiError, LineIndex, Pointer, Result};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use rowan::{TextRange, TextSize};

pub const ROOT_ELEMENT: &str = "rootElement";
pub const SUB_ELEMENTS: &str = "subElements";
pub const TEXT_CONTENTS: &str = "textContents";
pub const ATTRIBUTES: &str = "attributes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Qualified name as written
    pub name: String,
    /// Unescaped value
    pub value: String,
    /// From the first name character through the closing quote
    pub range: TextRange,
    pub name_range: TextRange,
    /// Between the quotes
    pub value_range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlText {
    pub text: String,
    pub range: TextRange,
    pub cdata: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlComment {
    pub text: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name (`edmx:Include`)
    pub name: String,
    pub prefix: Option<String>,
    pub local_name: String,
    pub attributes: IndexMap<String, XmlAttribute>,
    pub sub_elements: Vec<XmlElement>,
    pub text_contents: Vec<XmlText>,
    /// Comments directly inside this element
    pub comments: Vec<XmlComment>,
    pub range: TextRange,
    pub open_tag: TextRange,
    pub name_range: TextRange,
    /// `None` for self-closing elements
    pub close_tag: Option<TextRange>,
    pub close_name_range: Option<TextRange>,
}

impl XmlElement {
    pub fn is_self_closing(&self) -> bool {
        self.close_tag.is_none()
    }

    /// Range between the open and the close tag
    pub fn content_range(&self) -> Option<TextRange> {
        self.close_tag
            .map(|close| TextRange::new(self.open_tag.end(), close.start()))
    }

    /// End of the last attribute, or of the name when there is none
    pub fn attributes_end(&self) -> TextSize {
        self.attributes
            .values()
            .map(|attribute| attribute.range.end())
            .max()
            .unwrap_or(self.name_range.end())
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|attribute| attribute.value.as_str())
    }

    /// Sub-elements with a local name, with their index
    pub fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = (usize, &'a XmlElement)> + 'a {
        self.sub_elements
            .iter()
            .enumerate()
            .filter(move |(_, element)| element.local_name == local_name)
    }

    /// Concatenated text content
    pub fn text(&self) -> String {
        self.text_contents.iter().map(|text| text.text.as_str()).collect()
    }
}

/// A parsed XML file
#[derive(Debug, Clone)]
pub struct XmlDocument {
    uri: String,
    root: XmlElement,
    /// Comments outside the root element
    comments: Vec<XmlComment>,
    index: LineIndex,
}

impl XmlDocument {
    /// Parse a document; malformed input is an [`ApiError::Parse`]
    pub fn parse(uri: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        let text = text.into();
        let (root, comments) = Parser::new(&uri, &text).run()?;
        Ok(Self {
            uri,
            root,
            comments,
            index: LineIndex::new(text),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        self.index.text()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn comments(&self) -> &[XmlComment] {
        &self.comments
    }

    pub fn slice(&self, range: TextRange) -> &str {
        &self.text()[range]
    }

    pub fn root_pointer() -> Pointer {
        Pointer::from_segments([ROOT_ELEMENT])
    }

    pub fn element_at(&self, pointer: &Pointer) -> Option<&XmlElement> {
        let mut segments = pointer.segments().iter();
        if segments.next()? != ROOT_ELEMENT {
            return None;
        }
        let mut current = &self.root;
        while let Some(segment) = segments.next() {
            if segment != SUB_ELEMENTS {
                return None;
            }
            let index: usize = segments.next()?.parse().ok()?;
            current = current.sub_elements.get(index)?;
        }
        Some(current)
    }

    /// Attribute addressed by `.../attributes/{position}` and its owner
    pub fn attribute_at(&self, pointer: &Pointer) -> Option<(&XmlElement, &XmlAttribute)> {
        let position = pointer.last_index()?;
        let marker = pointer.len().checked_sub(2).and_then(|i| pointer.get(i))?;
        if marker != ATTRIBUTES {
            return None;
        }
        let owner = self.element_at(&pointer.ancestor(2)?)?;
        let (_, attribute) = owner.attributes.get_index(position)?;
        Some((owner, attribute))
    }
}

fn size(offset: usize) -> TextSize {
    TextSize::from(offset as u32)
}

fn span(start: usize, end: usize) -> TextRange {
    TextRange::new(size(start), size(end))
}

fn split_name(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

struct Parser<'a> {
    uri: &'a str,
    text: &'a str,
    cursor: usize,
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    comments: Vec<XmlComment>,
}

impl<'a> Parser<'a> {
    fn new(uri: &'a str, text: &'a str) -> Self {
        Self {
            uri,
            text,
            cursor: if text.starts_with('\u{feff}') { 3 } else { 0 },
            stack: Vec::new(),
            root: None,
            comments: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(XmlElement, Vec<XmlComment>)> {
        let mut reader = Reader::from_str(self.text);
        reader.config_mut().trim_text(false);
        loop {
            let event = reader.read_event().map_err(|error| {
                self.error(format!("{error} (near byte {})", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => {
                    let element = self.open(&start)?;
                    self.stack.push(element);
                }
                Event::Empty(start) => {
                    let element = self.open(&start)?;
                    self.attach(element)?;
                }
                Event::End(_) => self.close()?,
                Event::Text(text) => {
                    let range = self.text_span();
                    let value = text
                        .unescape()
                        .map_err(|error| self.error(error.to_string()))?
                        .into_owned();
                    if let Some(parent) = self.stack.last_mut() {
                        parent.text_contents.push(XmlText {
                            text: value,
                            range,
                            cdata: false,
                        });
                    }
                }
                Event::CData(data) => {
                    let range = self.markup_span("]]>")?;
                    let value = String::from_utf8_lossy(&data).into_owned();
                    if let Some(parent) = self.stack.last_mut() {
                        parent.text_contents.push(XmlText {
                            text: value,
                            range,
                            cdata: true,
                        });
                    }
                }
                Event::Comment(comment) => {
                    let range = self.markup_span("-->")?;
                    let comment = XmlComment {
                        text: String::from_utf8_lossy(&comment).into_owned(),
                        range,
                    };
                    match self.stack.last_mut() {
                        Some(parent) => parent.comments.push(comment),
                        None => self.comments.push(comment),
                    }
                }
                Event::Decl(_) | Event::PI(_) => {
                    self.markup_span("?>")?;
                }
                Event::DocType(_) => {
                    let begin = self.next_markup()?;
                    self.cursor = self.tag_end(begin)?;
                }
                Event::Eof => break,
            }
        }
        if let Some(open) = self.stack.last() {
            return Err(self.error(format!("Element '{}' is not closed", open.name)));
        }
        let root = self
            .root
            .ok_or_else(|| ApiError::parse(self.uri, "Document has no root element"))?;
        Ok((root, self.comments))
    }

    fn error(&self, message: impl Into<String>) -> ApiError {
        ApiError::parse(self.uri, message)
    }

    fn open(&mut self, start: &BytesStart<'_>) -> Result<XmlElement> {
        for attribute in start.attributes() {
            attribute.map_err(|error| self.error(error.to_string()))?;
        }
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|error| self.error(error.to_string()))?
            .to_string();
        let begin = self.next_markup()?;
        let end = self.tag_end(begin)?;
        self.cursor = end;

        let name_start = begin + 1;
        let name_range = span(name_start, name_start + name.len());
        let attributes = self.scan_attributes(name_start + name.len(), end)?;
        let (prefix, local_name) = split_name(&name);
        Ok(XmlElement {
            name,
            prefix,
            local_name,
            attributes,
            sub_elements: Vec::new(),
            text_contents: Vec::new(),
            comments: Vec::new(),
            range: span(begin, end),
            open_tag: span(begin, end),
            name_range,
            close_tag: None,
            close_name_range: None,
        })
    }

    fn close(&mut self) -> Result<()> {
        let begin = self.next_markup()?;
        let end = self.tag_end(begin)?;
        self.cursor = end;
        let Some(mut element) = self.stack.pop() else {
            return Err(self.error(format!("Unexpected closing tag at byte {begin}")));
        };
        let name_start = begin + 2;
        element.close_tag = Some(span(begin, end));
        element.close_name_range = Some(span(name_start, name_start + element.name.len()));
        element.range = TextRange::new(element.open_tag.start(), size(end));
        self.attach(element)
    }

    fn attach(&mut self, element: XmlElement) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => parent.sub_elements.push(element),
            None if self.root.is_some() => {
                return Err(self.error(format!(
                    "Second root element '{}' at byte {}",
                    element.name,
                    u32::from(element.range.start())
                )));
            }
            None => self.root = Some(element),
        }
        Ok(())
    }

    /// Text runs up to the next markup
    fn text_span(&mut self) -> TextRange {
        let start = self.cursor;
        let end = self.text[start..]
            .find('<')
            .map(|i| i + start)
            .unwrap_or(self.text.len());
        self.cursor = end;
        span(start, end)
    }

    fn markup_span(&mut self, terminator: &str) -> Result<TextRange> {
        let begin = self.next_markup()?;
        let end = self.text[begin..]
            .find(terminator)
            .map(|i| begin + i + terminator.len())
            .ok_or_else(|| self.error(format!("Unterminated markup at byte {begin}")))?;
        self.cursor = end;
        Ok(span(begin, end))
    }

    fn next_markup(&self) -> Result<usize> {
        self.text[self.cursor..]
            .find('<')
            .map(|i| i + self.cursor)
            .ok_or_else(|| self.error("Unexpected end of document"))
    }

    /// Offset after the `>` closing the tag at `begin`, skipping quoted
    /// values and bracketed internal subsets
    fn tag_end(&self, begin: usize) -> Result<usize> {
        let bytes = self.text.as_bytes();
        let mut quote = None;
        let mut depth = 0usize;
        for (i, &byte) in bytes.iter().enumerate().skip(begin + 1) {
            match (quote, byte) {
                (Some(q), b) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(byte),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => return Ok(i + 1),
                _ => {}
            }
        }
        Err(self.error(format!("Unterminated tag at byte {begin}")))
    }

    fn scan_attributes(&self, from: usize, to: usize) -> Result<IndexMap<String, XmlAttribute>> {
        let bytes = self.text.as_bytes();
        let mut attributes = IndexMap::new();
        let mut i = from;
        loop {
            while i < to && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= to || matches!(bytes[i], b'/' | b'>') {
                break;
            }
            let name_start = i;
            while i < to && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/' | b'>') {
                i += 1;
            }
            let name_end = i;
            while i < to && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= to || bytes[i] != b'=' {
                return Err(self.error(format!("Attribute without value at byte {name_start}")));
            }
            i += 1;
            while i < to && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let quote = bytes.get(i).copied().filter(|b| matches!(b, b'"' | b'\''));
            let Some(quote) = quote else {
                return Err(self.error(format!("Unquoted attribute value at byte {i}")));
            };
            let value_start = i + 1;
            let value_end = self.text[value_start..to]
                .find(quote as char)
                .map(|offset| value_start + offset)
                .ok_or_else(|| self.error(format!("Unterminated attribute value at byte {i}")))?;
            i = value_end + 1;

            let name = self.text[name_start..name_end].to_string();
            let raw = &self.text[value_start..value_end];
            let value = unescape(raw)
                .map_err(|error| self.error(error.to_string()))?
                .into_owned();
            attributes.insert(
                name.clone(),
                XmlAttribute {
                    name,
                    value,
                    range: span(name_start, i),
                    name_range: span(name_start, name_end),
                    value_range: span(value_start, value_end),
                },
            );
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation_core::ErrorCode;

    const TEXT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns:edmx="urn:x">
    <!-- leading -->
    <edmx:item Name="a &amp; b" Other='x'/>
    <text>hello &lt;world&gt;</text>
</root>
"#;

    #[test]
    fn test_parse_tracks_ranges() {
        let doc = XmlDocument::parse("file:///a.xml", TEXT).unwrap();
        let root = doc.root();
        assert_eq!(root.name, "root");
        assert_eq!(root.sub_elements.len(), 2);
        assert_eq!(root.comments.len(), 1);
        assert_eq!(doc.slice(root.comments[0].range), "<!-- leading -->");

        let item = &root.sub_elements[0];
        assert!(item.is_self_closing());
        assert_eq!(item.prefix.as_deref(), Some("edmx"));
        assert_eq!(item.local_name, "item");
        assert_eq!(doc.slice(item.range), r#"<edmx:item Name="a &amp; b" Other='x'/>"#);
        let name = &item.attributes["Name"];
        assert_eq!(name.value, "a & b");
        assert_eq!(doc.slice(name.value_range), "a &amp; b");
        assert_eq!(doc.slice(name.range), r#"Name="a &amp; b""#);
        assert_eq!(doc.slice(item.attributes["Other"].value_range), "x");
        assert_eq!(u32::from(item.attributes_end()), u32::from(item.attributes["Other"].range.end()));

        let text = &root.sub_elements[1];
        assert_eq!(text.text(), "hello <world>");
        assert_eq!(doc.slice(text.content_range().unwrap()), "hello &lt;world&gt;");
        assert_eq!(doc.slice(text.close_name_range.unwrap()), "text");
    }

    #[test]
    fn test_pointers_address_elements_and_attributes() {
        let doc = XmlDocument::parse("file:///a.xml", TEXT).unwrap();
        let item = doc
            .element_at(&Pointer::parse("/rootElement/subElements/0"))
            .unwrap();
        assert_eq!(item.local_name, "item");
        let (_, attribute) = doc
            .attribute_at(&Pointer::parse("/rootElement/subElements/0/attributes/1"))
            .unwrap();
        assert_eq!(attribute.name, "Other");
        assert!(doc.element_at(&Pointer::parse("/rootElement/subElements/7")).is_none());
    }

    #[test]
    fn test_malformed_documents_are_parse_errors() {
        for text in ["<a><b></a>", "<a>", "", "<a x=\"1\" x=\"2\"/>"] {
            let error = XmlDocument::parse("file:///bad.xml", text).unwrap_err();
            assert_eq!(error.code(), ErrorCode::Parse, "{text}");
        }
    }
}
