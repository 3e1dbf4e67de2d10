//! Text edits for CDS annotation files
//!
//! CDS annotations are comma separated lists (terms inside `@( ... )`,
//! collection items, record members). Deletions and insertions are grouped
//! per list so that neighbouring separators are edited once: a run of
//! deleted entries is cut up to the next surviving entry, or back to the
//! previous one at the end of a list. Inserted entries copy the layout of
//! their neighbours.
//!
//! Attribute insertion and deletion as well as moves have no CDS rendering
//! here and are rejected.

use crate::printer::{CdsPrinter, ListKind, attribute_value, primitive};
use annotation_core::model::names;
use annotation_core::{
    AnnotationFile, AnnotationFileChange, ApiError, Element, LineIndex, Node, OffsetEdit, Pointer,
    Result, TextEdit,
};
use indexmap::IndexMap;
use rowan::{TextRange, TextSize};
use std::collections::BTreeSet;

/// Pending entry edits of one list
#[derive(Debug, Default)]
struct ListEdits {
    deleted: BTreeSet<usize>,
    inserts: Vec<(Option<usize>, Element)>,
}

/// A comma separated list in the source
struct List {
    kind: ListKind,
    /// Entry ranges; leading `fixed` entries (a record's `$Type`) are never
    /// addressed by indices
    entries: Vec<TextRange>,
    fixed: usize,
    /// Between the delimiters
    inner: TextRange,
    /// Start of the construct owning the list, for indentation
    owner: TextSize,
    /// Set for target term lists: the statement removed when no term is left
    statement: Option<TextRange>,
}

pub struct CdsWriter<'a> {
    file: &'a AnnotationFile,
    index: LineIndex,
    indent: String,
    eol: &'static str,
    lists: IndexMap<Pointer, ListEdits>,
    edits: Vec<OffsetEdit>,
}

impl<'a> CdsWriter<'a> {
    pub fn new(file: &'a AnnotationFile, text: &str, indent: &str, eol: &'static str) -> Self {
        Self {
            file,
            index: LineIndex::new(text),
            indent: indent.to_string(),
            eol,
            lists: IndexMap::new(),
            edits: Vec::new(),
        }
    }

    fn printer(&self) -> CdsPrinter<'_> {
        CdsPrinter::new(&self.indent, self.eol)
    }

    fn text(&self) -> &str {
        self.index.text()
    }

    /// Text edits for a batch of changes of this file
    pub fn text_edits(self, changes: &[&AnnotationFileChange]) -> Result<Vec<TextEdit>> {
        let index = self.index.clone();
        let edits = self.offset_edits(changes)?;
        Ok(edits.iter().map(|edit| index.to_text_edit(edit)).collect())
    }

    pub fn offset_edits(mut self, changes: &[&AnnotationFileChange]) -> Result<Vec<OffsetEdit>> {
        let deleted: Vec<&Pointer> = changes
            .iter()
            .filter_map(|change| match change {
                AnnotationFileChange::DeleteElement { pointer, .. } => Some(pointer),
                _ => None,
            })
            .collect();
        for change in changes {
            let inside_deleted = change
                .pointer()
                .is_some_and(|pointer| deleted.iter().any(|d| pointer.is_descendant_of(d)));
            if inside_deleted {
                tracing::trace!("Dropping {} inside a deleted element", change.kind());
                continue;
            }
            self.add_change(change)?;
        }
        let lists = std::mem::take(&mut self.lists);
        for (pointer, list_edits) in lists {
            let list = self.list(&pointer)?;
            self.edit_list(&list, list_edits)?;
        }
        let mut edits = self.edits;
        sort_and_check(&mut edits)?;
        Ok(edits)
    }

    fn add_change(&mut self, change: &AnnotationFileChange) -> Result<()> {
        match change {
            AnnotationFileChange::InsertTarget { target, .. } => {
                let printed = self.printer().print_target(target, "")?;
                let end = TextSize::of(self.text());
                let text = if self.text().trim().is_empty() {
                    format!("{printed}{}", self.eol)
                } else if self.text().ends_with('\n') {
                    format!("{}{printed}{}", self.eol, self.eol)
                } else {
                    format!("{}{}{printed}", self.eol, self.eol)
                };
                self.edits.push(OffsetEdit::insert(end, text));
            }
            AnnotationFileChange::InsertElement { pointer, index, element, .. } => {
                self.lists
                    .entry(pointer.clone())
                    .or_default()
                    .inserts
                    .push((*index, element.clone()));
            }
            AnnotationFileChange::DeleteElement { pointer, .. } => {
                let (list, position) = list_entry(pointer)?;
                self.lists.entry(list).or_default().deleted.insert(position);
            }
            AnnotationFileChange::ReplaceElement { pointer, element, .. } => {
                let (parent, _) = list_entry(pointer)?;
                let range = self.element(pointer)?.range.ok_or_else(|| missing_range(pointer))?;
                let base = self.index.line_indent(range.start()).to_string();
                let printed = if !is_target(&parent)
                    && names::is_value_holder(&self.element(&parent)?.name)
                {
                    self.printer().print_value(element, &base)?
                } else {
                    let kind = self.list_kind(&parent)?;
                    self.printer().print_item(element, kind, &base)?
                };
                self.edits.push(OffsetEdit::replace(range, printed));
            }
            AnnotationFileChange::ReplaceElementContent { pointer, content, .. } => {
                self.replace_content(pointer, content)?;
            }
            AnnotationFileChange::ReplaceText { pointer, text, .. } => {
                let element = self.element(pointer)?;
                let range = element.range.ok_or_else(|| missing_range(pointer))?;
                let literal = primitive(&element.name, text)?;
                self.edits.push(OffsetEdit::replace(range, literal));
            }
            AnnotationFileChange::UpdateAttributeValue { pointer, value, .. } => {
                let (name, range) = self.attribute_range(pointer)?;
                self.edits
                    .push(OffsetEdit::replace(range, attribute_value(&name, value)?));
            }
            AnnotationFileChange::ReplaceAttribute { pointer, name, value, .. } => {
                let (old, range) = self.attribute_range(pointer)?;
                if !names::is_attribute_expression(&old) || !names::is_attribute_expression(name) {
                    return Err(ApiError::general(format!(
                        "Replacing attribute '{old}' with '{name}' is not supported in CDS files"
                    )));
                }
                self.edits.push(OffsetEdit::replace(range, primitive(name, value)?));
            }
            AnnotationFileChange::InsertAttribute { .. }
            | AnnotationFileChange::DeleteAttribute { .. }
            | AnnotationFileChange::MoveElements { .. } => {
                return Err(ApiError::general(format!(
                    "{} changes are not supported in CDS files",
                    change.kind()
                )));
            }
        }
        Ok(())
    }

    fn element(&self, pointer: &Pointer) -> Result<&'a Element> {
        self.file.element_at(pointer).ok_or_else(|| {
            ApiError::general(format!("Cannot resolve '{pointer}' in '{}'", self.file.uri))
        })
    }

    fn attribute_range(&self, pointer: &Pointer) -> Result<(String, TextRange)> {
        let name = match pointer.segments() {
            [.., attributes, name] if attributes == "attributes" => name.clone(),
            _ => return Err(ApiError::general(format!("'{pointer}' is not an attribute"))),
        };
        let owner = pointer
            .ancestor(2)
            .ok_or_else(|| ApiError::general(format!("'{pointer}' is not an attribute")))?;
        let range = self
            .element(&owner)?
            .attributes
            .get(&name)
            .and_then(|attribute| attribute.value_range)
            .ok_or_else(|| missing_range(pointer))?;
        Ok((name, range))
    }

    fn list_kind(&self, pointer: &Pointer) -> Result<ListKind> {
        if is_target(pointer) {
            return Ok(ListKind::Terms);
        }
        match self.element(pointer)?.name.as_str() {
            names::COLLECTION => Ok(ListKind::Collection),
            names::RECORD => Ok(ListKind::Record),
            other => Err(ApiError::general(format!(
                "'{other}' at '{pointer}' has no entry list in CDS"
            ))),
        }
    }

    fn list(&self, pointer: &Pointer) -> Result<List> {
        if is_target(pointer) {
            let target = pointer
                .last_index()
                .and_then(|i| self.file.targets.get(i))
                .ok_or_else(|| ApiError::general(format!("Unknown target '{pointer}'")))?;
            let statement = target.range.ok_or_else(|| missing_range(pointer))?;
            return Ok(List {
                kind: ListKind::Terms,
                entries: target
                    .terms
                    .iter()
                    .map(|term| term.range.ok_or_else(|| missing_range(pointer)))
                    .collect::<Result<_>>()?,
                fixed: 0,
                inner: target.terms_range.ok_or_else(|| missing_range(pointer))?,
                owner: statement.start(),
                statement: Some(statement),
            });
        }
        let kind = self.list_kind(pointer)?;
        let element = self.element(pointer)?;
        let mut entries = Vec::new();
        if kind == ListKind::Record {
            if let Some(type_attribute) = element.attributes.get(names::TYPE) {
                if let (Some(name), Some(value)) = (type_attribute.name_range, type_attribute.value_range) {
                    entries.push(name.cover(value));
                }
            }
        }
        let fixed = entries.len();
        for node in &element.content {
            entries.push(node.range().ok_or_else(|| missing_range(pointer))?);
        }
        let range = element.range.ok_or_else(|| missing_range(pointer))?;
        Ok(List {
            kind,
            entries,
            fixed,
            inner: element.content_range.ok_or_else(|| missing_range(pointer))?,
            owner: range.start(),
            statement: None,
        })
    }

    fn edit_list(&mut self, list: &List, edits: ListEdits) -> Result<()> {
        let deleted: BTreeSet<usize> = edits.deleted.iter().map(|i| i + list.fixed).collect();
        let survivors: Vec<usize> = (0..list.entries.len())
            .filter(|i| !deleted.contains(i))
            .collect();

        if survivors.is_empty() {
            if let (Some(statement), true) = (list.statement, edits.inserts.is_empty()) {
                tracing::debug!("Removing annotate statement without terms");
                self.edits.push(OffsetEdit::delete(self.line_range(statement)));
                return Ok(());
            }
            let outer = self.index.line_indent(list.owner).to_string();
            let inner = format!("{outer}{}", self.indent);
            let mut text = String::new();
            for (position, (_, element)) in edits.inserts.iter().enumerate() {
                let printed = self.printer().print_item(element, list.kind, &inner)?;
                text.push_str(self.eol);
                text.push_str(&inner);
                text.push_str(&printed);
                // terms have no trailing comma
                if list.kind != ListKind::Terms || position + 1 < edits.inserts.len() {
                    text.push(',');
                }
            }
            if !text.is_empty() {
                text.push_str(self.eol);
                text.push_str(&outer);
            }
            self.edits.push(OffsetEdit::replace(list.inner, text));
            return Ok(());
        }

        // deleted runs
        let mut position = 0;
        while position < list.entries.len() {
            if !deleted.contains(&position) {
                position += 1;
                continue;
            }
            let first = position;
            while position < list.entries.len() && deleted.contains(&position) {
                position += 1;
            }
            let last = position - 1;
            let range = if position < list.entries.len() {
                TextRange::new(self.lead(list.entries[first]), self.lead(list.entries[position]))
            } else {
                TextRange::new(list.entries[first - 1].end(), list.entries[last].end())
            };
            self.edits.push(OffsetEdit::delete(range));
        }

        let tail_deleted = survivors.last().is_some_and(|last| *last + 1 < list.entries.len());
        for (index, element) in &edits.inserts {
            let anchor = index.and_then(|index| {
                survivors
                    .iter()
                    .copied()
                    .find(|survivor| *survivor >= index + list.fixed)
            });
            match anchor {
                Some(anchor) => {
                    let range = list.entries[anchor];
                    let (separator, base) = self.separator(range);
                    let printed = self.printer().print_item(element, list.kind, &base)?;
                    self.edits.push(OffsetEdit::insert(
                        range.start(),
                        format!("{printed},{separator}"),
                    ));
                }
                None => {
                    let last = survivors[survivors.len() - 1];
                    let range = list.entries[last];
                    let (separator, base) = self.separator(range);
                    let printed = self.printer().print_item(element, list.kind, &base)?;
                    let comma = (!tail_deleted).then(|| self.comma_after(range.end())).flatten();
                    let edit = match comma {
                        Some(offset) => OffsetEdit::insert(offset, format!("{separator}{printed},")),
                        None => OffsetEdit::insert(range.end(), format!(",{separator}{printed}")),
                    };
                    self.edits.push(edit);
                }
            }
        }
        Ok(())
    }

    fn replace_content(&mut self, pointer: &Pointer, content: &[Node]) -> Result<()> {
        let element = self.element(pointer)?;
        let children: Vec<&Element> = content.iter().filter_map(Node::as_element).collect();
        if names::is_value_holder(&element.name) {
            let [value] = children.as_slice() else {
                return Err(ApiError::general(format!(
                    "Content of '{pointer}' must be a single value in CDS files"
                )));
            };
            let range = match (element.expression_attribute(), element.expression_child()) {
                (Some(attribute), _) => attribute.value_range,
                (None, Some((_, child))) => child.range,
                (None, None) => None,
            }
            .ok_or_else(|| missing_range(pointer))?;
            let base = self.index.line_indent(range.start()).to_string();
            let printed = self.printer().print_value(value, &base)?;
            self.edits.push(OffsetEdit::replace(range, printed));
            return Ok(());
        }
        let list = self.list(pointer)?;
        let outer = self.index.line_indent(list.owner).to_string();
        let inner = format!("{outer}{}", self.indent);
        let mut text = String::new();
        for entry in list.entries.iter().take(list.fixed) {
            text.push_str(self.eol);
            text.push_str(&inner);
            text.push_str(&self.text()[*entry]);
            text.push(',');
        }
        for child in children {
            text.push_str(self.eol);
            text.push_str(&inner);
            text.push_str(&self.printer().print_item(child, list.kind, &inner)?);
            text.push(',');
        }
        if !text.is_empty() {
            text.push_str(self.eol);
            text.push_str(&outer);
        }
        self.edits.push(OffsetEdit::replace(list.inner, text));
        Ok(())
    }

    /// Separator between entries laid out like the one at `range`, and the
    /// indentation of that entry
    fn separator(&self, range: TextRange) -> (String, String) {
        let indent = self.index.line_indent(range.start()).to_string();
        if self.starts_line(range.start()) {
            (format!("{}{indent}", self.eol), indent)
        } else {
            (" ".to_string(), indent)
        }
    }

    fn starts_line(&self, offset: TextSize) -> bool {
        self.index.line_prefix(offset).trim().is_empty()
    }

    /// Line start when the entry begins its line, its own start otherwise
    fn lead(&self, range: TextRange) -> TextSize {
        if self.starts_line(range.start()) {
            range.start() - TextSize::of(self.index.line_prefix(range.start()))
        } else {
            range.start()
        }
    }

    /// Offset after a comma following `offset` across whitespace
    fn comma_after(&self, offset: TextSize) -> Option<TextSize> {
        let rest = &self.text()[usize::from(offset)..];
        let skipped = rest.len() - rest.trim_start().len();
        rest[skipped..]
            .starts_with(',')
            .then(|| offset + TextSize::from(skipped as u32 + 1))
    }

    /// `range` widened to whole lines when it occupies them alone
    fn line_range(&self, range: TextRange) -> TextRange {
        let text = self.text();
        let start = self.lead(range);
        let rest = &text[usize::from(range.end())..];
        let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let after = &rest[spaces..];
        let line_break = if after.starts_with("\r\n") {
            2
        } else if after.starts_with('\n') {
            1
        } else {
            return TextRange::new(start, range.end());
        };
        if start != range.start() || self.starts_line(range.start()) {
            TextRange::new(start, range.end() + TextSize::from((spaces + line_break) as u32))
        } else {
            TextRange::new(start, range.end())
        }
    }
}

fn is_target(pointer: &Pointer) -> bool {
    matches!(pointer.segments(), [targets, _] if targets == "targets")
}

/// Owning list pointer and entry index of a term or content pointer
fn list_entry(pointer: &Pointer) -> Result<(Pointer, usize)> {
    let position = pointer.last_index();
    let owner = pointer.ancestor(2);
    match (pointer.segments(), position, owner) {
        ([.., kind, _], Some(position), Some(owner)) if kind == "terms" || kind == "content" => {
            Ok((owner, position))
        }
        _ => Err(ApiError::general(format!(
            "'{pointer}' does not address a list entry"
        ))),
    }
}

fn missing_range(pointer: &Pointer) -> ApiError {
    ApiError::general(format!("No source range for '{pointer}'"))
}

/// Order edits by position and reject overlapping ones
fn sort_and_check(edits: &mut [OffsetEdit]) -> Result<()> {
    edits.sort_by_key(|edit| (edit.range.start(), !edit.is_insertion()));
    for pair in edits.windows(2) {
        if pair[1].range.start() < pair[0].range.end() {
            return Err(ApiError::general(format!(
                "Conflicting changes at offset {}",
                u32::from(pair[1].range.start())
            )));
        }
    }
    Ok(())
}

/// Indent unit of a CDS document: the first indented line's leading
/// whitespace
pub fn detect_indent(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let trimmed = line.trim_start_matches([' ', '\t']);
        let width = line.len() - trimmed.len();
        (width > 0 && !trimmed.is_empty()).then(|| line[..width].to_string())
    })
}
