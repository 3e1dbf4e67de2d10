//! Local state of one conversion run

use crate::alias::AliasInformation;
use crate::change::AnnotationReference;
use crate::internal::AnnotationFileChange;
use crate::model::{Element, Target};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

/// Where an annotation inserted in the current batch lives until output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingSlot {
    /// `InsertElement` at this output index
    Output(usize),
    /// Term of a target that is created by this batch
    NewTarget { target: usize, term: usize },
}

#[derive(Debug, Clone)]
struct PendingAnnotation {
    uri: String,
    target: String,
    term: String,
    qualifier: Option<String>,
    slot: PendingSlot,
}

/// Accumulated state, built fresh for every `convert` call
#[derive(Debug, Default)]
pub struct ConversionState {
    aliases: HashMap<String, Rc<AliasInformation>>,
    pending: Vec<PendingAnnotation>,
    /// (uri, full target path) -> target created by this batch
    new_targets: IndexMap<(String, String), Target>,
    output: Vec<AnnotationFileChange>,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_aliases(&self, uri: &str) -> Option<Rc<AliasInformation>> {
        self.aliases.get(uri).cloned()
    }

    pub fn cache_aliases(&mut self, uri: &str, aliases: AliasInformation) -> Rc<AliasInformation> {
        let aliases = Rc::new(aliases);
        self.aliases.insert(uri.to_string(), Rc::clone(&aliases));
        aliases
    }

    pub fn push(&mut self, change: AnnotationFileChange) {
        self.output.push(change);
    }

    /// Queue an annotation insert into an existing target
    pub fn push_pending_insert(
        &mut self,
        uri: &str,
        target: &str,
        reference: (&str, Option<&str>),
        change: AnnotationFileChange,
    ) {
        let slot = PendingSlot::Output(self.output.len());
        self.output.push(change);
        self.remember(uri, target, reference, slot);
    }

    /// Add an annotation to a target created by this batch
    pub fn add_to_new_target(
        &mut self,
        uri: &str,
        target: &str,
        target_name: impl FnOnce() -> String,
        reference: (&str, Option<&str>),
        element: Element,
    ) {
        let key = (uri.to_string(), target.to_string());
        let entry = self.new_targets.entry(key);
        let target_index = entry.index();
        let new_target = entry.or_insert_with(|| Target::new(target_name()));
        new_target.terms.push(element);
        let slot = PendingSlot::NewTarget {
            target: target_index,
            term: new_target.terms.len() - 1,
        };
        self.remember(uri, target, reference, slot);
    }

    pub fn has_new_target(&self, uri: &str, target: &str) -> bool {
        self.new_targets
            .contains_key(&(uri.to_string(), target.to_string()))
    }

    /// True when the reference names an annotation inserted by this batch
    pub fn has_pending(&self, uri: &str, reference: &AnnotationReference) -> bool {
        self.pending_slot(uri, reference).is_some()
    }

    /// Element of an annotation inserted earlier in this batch
    pub fn pending_element_mut(
        &mut self,
        uri: &str,
        reference: &AnnotationReference,
    ) -> Option<&mut Element> {
        let slot = self.pending_slot(uri, reference)?;
        match slot {
            PendingSlot::Output(index) => match self.output.get_mut(index)? {
                AnnotationFileChange::InsertElement { element, .. } => Some(element),
                _ => None,
            },
            PendingSlot::NewTarget { target, term } => self
                .new_targets
                .get_index_mut(target)
                .and_then(|(_, target)| target.terms.get_mut(term)),
        }
    }

    /// Target inserts first, then everything else in batch order
    pub fn finish(self) -> Vec<AnnotationFileChange> {
        let mut changes = Vec::with_capacity(self.new_targets.len() + self.output.len());
        for ((uri, _), target) in self.new_targets {
            changes.push(AnnotationFileChange::InsertTarget { uri, target });
        }
        changes.extend(self.output);
        changes
    }

    /// Terms and targets match by full name, whichever form each side uses
    fn pending_slot(&self, uri: &str, reference: &AnnotationReference) -> Option<PendingSlot> {
        let aliases = self.aliases.get(uri)?;
        let target = aliases.to_full_path(&reference.target);
        let term = aliases.to_full_name(&reference.term);
        self.pending
            .iter()
            .rev()
            .find(|p| {
                p.uri == uri
                    && aliases.to_full_path(&p.target) == target
                    && aliases.to_full_name(&p.term) == term
                    && p.qualifier == reference.qualifier
            })
            .map(|p| p.slot)
    }

    fn remember(&mut self, uri: &str, target: &str, (term, qualifier): (&str, Option<&str>), slot: PendingSlot) {
        self.pending.push(PendingAnnotation {
            uri: uri.to_string(),
            target: target.to_string(),
            term: term.to_string(),
            qualifier: qualifier.map(str::to_string),
            slot,
        });
    }
}
