//! Text edits and workspace edits
//!
//! Writers compute [`OffsetEdit`]s against byte offsets of a source snapshot
//! and convert them with a [`LineIndex`] into [`TextEdit`]s that use
//! zero-based line/character positions (UTF-16 code units, end exclusive),
//! the shape text-document editing protocols expect.

use crate::error::ApiError;
use crate::result::Result;
use indexmap::IndexMap;
use rowan::{TextRange, TextSize};
use serde::{Deserialize, Serialize};

/// Zero-based line and UTF-16 character offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Replacement of a line/character range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

/// Per-file edits produced by one save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEdit {
    pub changes: IndexMap<String, Vec<TextEdit>>,
}

/// Replacement of a byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEdit {
    pub range: TextRange,
    pub new_text: String,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

impl TextEdit {
    pub fn new(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::new(Range::new(position, position), text)
    }
}

impl OffsetEdit {
    pub fn replace(range: TextRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    pub fn insert(offset: TextSize, text: impl Into<String>) -> Self {
        Self::replace(TextRange::empty(offset), text)
    }

    pub fn delete(range: TextRange) -> Self {
        Self::replace(range, String::new())
    }

    pub fn is_insertion(&self) -> bool {
        self.range.is_empty()
    }
}

impl WorkspaceEdit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append edits for a uri, keeping earlier ones
    pub fn add(&mut self, uri: impl Into<String>, edits: Vec<TextEdit>) {
        self.changes.entry(uri.into()).or_default().extend(edits);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.values().all(Vec::is_empty)
    }

    /// Number of files with at least one edit
    pub fn file_count(&self) -> usize {
        self.changes.values().filter(|edits| !edits.is_empty()).count()
    }
}

/// Line start table over one text snapshot
#[derive(Debug, Clone)]
pub struct LineIndex {
    text: String,
    line_starts: Vec<TextSize>,
}

impl LineIndex {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![TextSize::from(0)];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::from((offset + 1) as u32));
            }
        }
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Position of a byte offset; offsets past the end clamp to the end
    pub fn position(&self, offset: TextSize) -> Position {
        let offset = offset.min(TextSize::of(self.text.as_str()));
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = usize::from(self.line_starts[line]);
        let character = self.text[start..usize::from(offset)]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();
        Position::new(line as u32, character as u32)
    }

    pub fn range(&self, range: TextRange) -> Range {
        Range::new(self.position(range.start()), self.position(range.end()))
    }

    /// Byte offset of a position; characters past the line end clamp to it
    pub fn offset(&self, position: Position) -> Option<TextSize> {
        let line = position.line as usize;
        let start = usize::from(*self.line_starts.get(line)?);
        let end = self
            .line_starts
            .get(line + 1)
            .map(|s| usize::from(*s))
            .unwrap_or(self.text.len());
        let mut remaining = position.character as usize;
        let mut offset = start;
        for ch in self.text[start..end].chars() {
            if remaining == 0 || ch == '\n' {
                break;
            }
            remaining = remaining.saturating_sub(ch.len_utf16());
            offset += ch.len_utf8();
        }
        Some(TextSize::from(offset as u32))
    }

    pub fn to_text_edit(&self, edit: &OffsetEdit) -> TextEdit {
        TextEdit::new(self.range(edit.range), edit.new_text.clone())
    }

    /// Text on the line containing `offset` before it
    pub fn line_prefix(&self, offset: TextSize) -> &str {
        let position = self.position(offset);
        let start = usize::from(self.line_starts[position.line as usize]);
        &self.text[start..usize::from(offset)]
    }

    /// Leading whitespace of the line containing `offset`
    pub fn line_indent(&self, offset: TextSize) -> &str {
        let position = self.position(offset);
        let start = usize::from(self.line_starts[position.line as usize]);
        let line = &self.text[start..];
        let width = line
            .char_indices()
            .find(|(_, ch)| *ch != ' ' && *ch != '\t')
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        &line[..width]
    }
}

/// Apply non-overlapping edits to a text
///
/// Edits are sorted by start position (stable, so several inserts at one
/// position keep their order). Overlapping ranges are an error.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<String> {
    let index = LineIndex::new(text);
    let mut offset_edits = Vec::with_capacity(edits.len());
    for edit in edits {
        let start = index
            .offset(edit.range.start)
            .ok_or_else(|| ApiError::general(format!("Edit start {:?} is outside the document", edit.range.start)))?;
        let end = index
            .offset(edit.range.end)
            .ok_or_else(|| ApiError::general(format!("Edit end {:?} is outside the document", edit.range.end)))?;
        if end < start {
            return Err(ApiError::general("Edit range ends before it starts"));
        }
        offset_edits.push(OffsetEdit::replace(TextRange::new(start, end), edit.new_text.clone()));
    }
    apply_offset_edits(text, offset_edits)
}

/// Apply byte-offset edits; same ordering rules as [`apply_text_edits`]
pub fn apply_offset_edits(text: &str, mut edits: Vec<OffsetEdit>) -> Result<String> {
    edits.sort_by_key(|edit| edit.range.start());
    let mut result = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for edit in &edits {
        let start = usize::from(edit.range.start());
        let end = usize::from(edit.range.end());
        if start < cursor {
            return Err(ApiError::general(format!(
                "Overlapping text edits at offset {start}"
            )));
        }
        if end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return Err(ApiError::general(format!(
                "Text edit {start}..{end} is outside the document"
            )));
        }
        result.push_str(&text[cursor..start]);
        result.push_str(&edit.new_text);
        cursor = end;
    }
    result.push_str(&text[cursor..]);
    Ok(result)
}
