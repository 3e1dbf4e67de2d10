//! Edits on the element children of one parent
//!
//! Comments directly before an element (after the previous sibling) are
//! attached to it, and a comment starting on the line where an element ends
//! trails it. Both travel with the element on delete and move.

use super::Piece;
use crate::document::{XmlDocument, XmlElement};
use crate::printer::XmlPrinter;
use annotation_core::{ApiError, OffsetEdit, Result};
use indexmap::IndexMap;
use rowan::{TextRange, TextSize};
use std::collections::BTreeSet;

/// Pending child operations of one parent element
#[derive(Debug, Default)]
pub(super) struct ChildEdits {
    /// Insert positions are indices of the original children; `None` appends
    pub inserts: Vec<(Option<usize>, Piece)>,
    pub deleted: BTreeSet<usize>,
    pub moved: BTreeSet<usize>,
}

/// Source geometry of the children of one parent
pub(super) struct Layout<'d> {
    document: &'d XmlDocument,
    parent: &'d XmlElement,
}

impl<'d> Layout<'d> {
    pub fn new(document: &'d XmlDocument, parent: &'d XmlElement) -> Self {
        Self { document, parent }
    }

    fn len(&self) -> usize {
        self.parent.sub_elements.len()
    }

    fn text(&self, range: TextRange) -> &'d str {
        self.document.slice(range)
    }

    fn child(&self, i: usize) -> &'d XmlElement {
        &self.parent.sub_elements[i]
    }

    /// End of the previous sibling (with its trailing comment) or of the open tag
    fn previous_end(&self, i: usize) -> TextSize {
        match i.checked_sub(1) {
            Some(previous) => self.trailing_end(previous),
            None => self.parent.open_tag.end(),
        }
    }

    /// End of the element including a comment that starts on its last line
    fn trailing_end(&self, i: usize) -> TextSize {
        let end = self.child(i).range.end();
        let limit = match self.parent.sub_elements.get(i + 1) {
            Some(next) => next.range.start(),
            None => self.parent.close_tag.map_or(end, |close| close.start()),
        };
        self.parent
            .comments
            .iter()
            .find(|comment| {
                comment.range.start() >= end
                    && comment.range.end() <= limit
                    && self
                        .text(TextRange::new(end, comment.range.start()))
                        .chars()
                        .all(|ch| ch == ' ' || ch == '\t')
            })
            .map_or(end, |comment| comment.range.end())
    }

    /// Start of the element or of its attached leading comments
    pub fn block_start(&self, i: usize) -> TextSize {
        let from = self.previous_end(i);
        let start = self.child(i).range.start();
        self.parent
            .comments
            .iter()
            .filter(|comment| comment.range.start() >= from && comment.range.end() <= start)
            .map(|comment| comment.range.start())
            .min()
            .unwrap_or(start)
    }

    /// Child `i` with its attached and trailing comments
    pub fn block_range(&self, i: usize) -> TextRange {
        TextRange::new(self.block_start(i), self.trailing_end(i))
    }

    pub fn removal_range(&self, i: usize) -> TextRange {
        TextRange::new(self.previous_end(i), self.trailing_end(i))
    }

    /// Exact source of children `first..=last` with the indentation of its first line
    pub fn block(&self, first: usize, last: usize) -> (String, String) {
        let start = self.block_start(first);
        let text = self.text(TextRange::new(start, self.trailing_end(last)));
        let indent = self.document.line_index().line_indent(start);
        (text.to_string(), indent.to_string())
    }

    fn starts_line(&self, offset: TextSize) -> bool {
        self.document.line_index().line_prefix(offset).trim().is_empty()
    }

    fn parent_indent(&self) -> &'d str {
        self.document.line_index().line_indent(self.parent.range.start())
    }

    fn child_indent(&self, unit: &str) -> String {
        match self.parent.sub_elements.first() {
            Some(first) if self.starts_line(first.range.start()) => self
                .document
                .line_index()
                .line_indent(first.range.start())
                .to_string(),
            _ => format!("{}{unit}", self.parent_indent()),
        }
    }
}

pub(super) fn render(printer: &XmlPrinter<'_>, piece: &Piece, indent: &str) -> String {
    match piece {
        Piece::Element(element) => printer.print_element(element, indent),
        Piece::Moved { text, indent: source } => reindent(text, source, indent),
    }
}

/// Replace the indentation `from` by `to` on every line after the first
fn reindent(text: &str, from: &str, to: &str) -> String {
    let mut lines = text.split('\n');
    let mut out = lines.next().unwrap_or_default().to_string();
    for line in lines {
        out.push('\n');
        match line.strip_prefix(from) {
            Some(rest) => {
                out.push_str(to);
                out.push_str(rest);
            }
            None => out.push_str(line),
        }
    }
    out
}

pub(super) fn child_edits(
    layout: &Layout<'_>,
    printer: &XmlPrinter<'_>,
    edits: &ChildEdits,
) -> Result<Vec<OffsetEdit>> {
    let n = layout.len();
    let removed: BTreeSet<usize> = edits.deleted.union(&edits.moved).copied().collect();
    if let Some(index) = removed.iter().find(|&&i| i >= n) {
        return Err(ApiError::general(format!(
            "Element '{}' has no child element at index {index}",
            layout.parent.name
        )));
    }
    let survivors: Vec<usize> = (0..n).filter(|i| !removed.contains(i)).collect();

    if n == 0 {
        return Ok(into_empty_parent(layout, printer, edits).into_iter().collect());
    }
    if survivors.is_empty() {
        return Ok(vec![replace_all_children(layout, printer, edits)]);
    }

    let mut result: Vec<OffsetEdit> = removed
        .iter()
        .map(|&i| OffsetEdit::delete(layout.removal_range(i)))
        .collect();

    let mut groups: IndexMap<Option<usize>, Vec<&Piece>> = IndexMap::new();
    for (index, piece) in &edits.inserts {
        let position = index.unwrap_or(n);
        let anchor = survivors.iter().copied().find(|&j| j >= position);
        groups.entry(anchor).or_default().push(piece);
    }
    let line_index = layout.document.line_index();
    for (anchor, pieces) in groups {
        let edit = match anchor {
            Some(j) => {
                let offset = layout.block_start(j);
                let indent = line_index.line_indent(offset);
                let separator = if layout.starts_line(offset) {
                    format!("{}{indent}", printer.eol())
                } else {
                    String::new()
                };
                let text: String = pieces
                    .iter()
                    .map(|piece| format!("{}{separator}", render(printer, piece, indent)))
                    .collect();
                OffsetEdit::insert(offset, text)
            }
            None => {
                let last = survivors[survivors.len() - 1];
                let offset = layout.trailing_end(last);
                let indent = line_index.line_indent(layout.child(last).range.start());
                let text: String = pieces
                    .iter()
                    .map(|piece| format!("{}{indent}{}", printer.eol(), render(printer, piece, indent)))
                    .collect();
                OffsetEdit::insert(offset, text)
            }
        };
        result.push(edit);
    }
    Ok(result)
}

/// Every existing child goes away: collapse, or put the new pieces in their place
fn replace_all_children(layout: &Layout<'_>, printer: &XmlPrinter<'_>, edits: &ChildEdits) -> OffsetEdit {
    let parent = layout.parent;
    let all = TextRange::new(layout.previous_end(0), layout.trailing_end(layout.len() - 1));
    if edits.inserts.is_empty() {
        if let Some(close) = parent.close_tag {
            let remainder = layout.text(TextRange::new(all.end(), close.start()));
            if remainder.trim().is_empty() && remainder.contains('\n') {
                let tag_end = parent.open_tag.end() - TextSize::from(1);
                return OffsetEdit::replace(TextRange::new(tag_end, close.end()), "/>");
            }
        }
        return OffsetEdit::delete(all);
    }
    let indent = layout.child_indent(printer.indent());
    let body: String = edits
        .inserts
        .iter()
        .map(|(_, piece)| format!("{}{indent}{}", printer.eol(), render(printer, piece, &indent)))
        .collect();
    OffsetEdit::replace(all, body)
}

/// Insert into an element without element children
fn into_empty_parent(layout: &Layout<'_>, printer: &XmlPrinter<'_>, edits: &ChildEdits) -> Option<OffsetEdit> {
    if edits.inserts.is_empty() {
        return None;
    }
    let parent = layout.parent;
    let eol = printer.eol();
    let outer = layout.parent_indent();
    let indent = format!("{outer}{}", printer.indent());
    let rendered: Vec<String> = edits
        .inserts
        .iter()
        .map(|(_, piece)| render(printer, piece, &indent))
        .collect();
    let body: String = rendered.iter().map(|text| format!("{eol}{indent}{text}")).collect();

    let Some(content) = parent.content_range() else {
        let tail = TextRange::new(parent.attributes_end(), parent.open_tag.end());
        return Some(OffsetEdit::replace(
            tail,
            format!(">{body}{eol}{outer}</{}>", parent.name),
        ));
    };
    if layout.text(content).trim().is_empty() {
        return Some(OffsetEdit::replace(content, format!("{body}{eol}{outer}")));
    }
    // comments only: keep them, add before the close tag
    let close = content.end();
    let prefix = layout.document.line_index().line_prefix(close);
    if prefix.trim().is_empty() {
        let line_start = close - TextSize::of(prefix);
        let text: String = rendered.iter().map(|text| format!("{indent}{text}{eol}")).collect();
        Some(OffsetEdit::insert(line_start, text))
    } else {
        Some(OffsetEdit::insert(close, format!("{body}{eol}{outer}")))
    }
}
