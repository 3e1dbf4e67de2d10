//! Annotation reference and pointer resolution
//!
//! Turns an [`AnnotationReference`] plus a pointer relative to the
//! annotation element into an absolute pointer inside one physical file,
//! following file merge maps when annotations are split over files.

use crate::adapter::CompiledService;
use crate::alias::AliasInformation;
use crate::change::AnnotationReference;
use crate::error::ApiError;
use crate::model::{AnnotationFile, Element, Target, names};
use crate::pointer::Pointer;
use crate::result::Result;
use crate::schema::FileMergeMaps;

/// An annotation found in a file
#[derive(Debug, Clone, Copy)]
pub struct ResolvedAnnotation<'a> {
    pub target_index: usize,
    pub term_index: usize,
    pub target: &'a Target,
    pub element: &'a Element,
}

impl ResolvedAnnotation<'_> {
    /// Absolute pointer of the annotation element
    pub fn pointer(&self) -> Pointer {
        Pointer::root()
            .child("targets")
            .child(self.target_index)
            .child("terms")
            .child(self.term_index)
    }
}

/// Absolute location of a change in a physical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub uri: String,
    pub pointer: Pointer,
}

/// Targets of a file whose full path equals `target`
pub fn find_targets<'a>(
    file: &'a AnnotationFile,
    target: &'a str,
    aliases: &'a AliasInformation,
) -> impl Iterator<Item = (usize, &'a Target)> + 'a {
    file.targets
        .iter()
        .enumerate()
        .filter(move |(_, candidate)| aliases.to_full_path(&candidate.name) == target)
}

/// First target of a file with the given full path
pub fn find_target<'a>(
    file: &'a AnnotationFile,
    target: &'a str,
    aliases: &'a AliasInformation,
) -> Option<(usize, &'a Target)> {
    find_targets(file, target, aliases).next()
}

/// Locate the annotation element a reference names
pub fn find_annotation_by_reference<'a>(
    file: &'a AnnotationFile,
    reference: &AnnotationReference,
    aliases: &AliasInformation,
) -> Option<ResolvedAnnotation<'a>> {
    file.targets
        .iter()
        .enumerate()
        .filter(|(_, target)| aliases.to_full_path(&target.name) == reference.target)
        .find_map(|(target_index, target)| {
            target
                .terms
                .iter()
                .position(|term| annotation_matches(term, reference, aliases))
                .map(|term_index| ResolvedAnnotation {
                    target_index,
                    term_index,
                    target,
                    element: &target.terms[term_index],
                })
        })
}

fn annotation_matches(element: &Element, reference: &AnnotationReference, aliases: &AliasInformation) -> bool {
    element.name == names::ANNOTATION
        && element
            .attribute(names::TERM)
            .is_some_and(|term| aliases.to_full_name(term) == reference.term)
        && element.attribute(names::QUALIFIER) == reference.qualifier.as_deref()
}

/// Resolve a change location to a physical file and absolute pointer
pub fn resolve_change_location(
    service: &CompiledService,
    merge_maps: &FileMergeMaps,
    aliases: &AliasInformation,
    uri: &str,
    reference: &AnnotationReference,
    pointer: &Pointer,
) -> Result<ResolvedLocation> {
    let file = service
        .file(uri)
        .ok_or_else(|| ApiError::general(format!("No annotation file found for '{uri}'")))?;
    let annotation = find_annotation_by_reference(file, reference, aliases).ok_or_else(|| {
        ApiError::general(format!("Annotation '{reference}' not found in '{uri}'"))
    })?;
    let absolute = annotation.pointer().join(pointer);
    Ok(remap(merge_maps, uri, absolute))
}

/// Apply the longest matching merge map prefix
pub fn remap(merge_maps: &FileMergeMaps, uri: &str, pointer: Pointer) -> ResolvedLocation {
    let best = merge_maps.get(uri).and_then(|map| {
        map.iter()
            .filter(|(prefix, _)| pointer.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
    });
    match best {
        Some((prefix, location)) => {
            let rest = pointer.strip_prefix(prefix).unwrap_or_default();
            tracing::trace!("Remapped {} in '{}' to '{}'", pointer, uri, location.uri);
            ResolvedLocation {
                uri: location.uri.clone(),
                pointer: location.pointer.join(&rest),
            }
        }
        None => ResolvedLocation {
            uri: uri.to_string(),
            pointer,
        },
    }
}
