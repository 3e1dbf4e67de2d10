//! Annotation Core
//!
//! Syntax-independent half of the annotation editing engine. Callers express
//! edits as [`Change`]s over the annotation value tree; the
//! [`converter`] resolves them against the compiled service and produces
//! [`AnnotationFileChange`]s, which source adapters turn into text edits.

pub mod adapter;
pub mod alias;
pub mod avt;
pub mod change;
pub mod config;
pub mod converter;
pub mod error;
pub mod internal;
pub mod model;
pub mod pointer;
pub mod resolver;
pub mod result;
pub mod schema;
pub mod text_edit;
pub mod vocabulary;

// Re-export commonly used types
pub use adapter::{CompiledService, FileCache, MetadataSummary, ServiceAdapter, TextFile, ValidationReport};
pub use alias::AliasInformation;
pub use avt::{Apply, Expression, PropertyValue, RawAnnotation, Record};
pub use change::{AnnotationReference, Change, InsertContent, UpdateContent};
pub use config::{LineEnding, SaveOptions, ServiceOptions, XmlFormatOptions};
pub use converter::{ChangeConverter, ConversionContext, convert};
pub use error::{ApiError, ErrorCode};
pub use internal::AnnotationFileChange;
pub use model::{AnnotationFile, Attribute, Element, Namespace, Node, Reference, Target, TextNode};
pub use pointer::Pointer;
pub use result::Result;
pub use schema::{FileMergeMaps, PhysicalLocation, ServiceSchema, ValueType, build_schema};
pub use text_edit::{LineIndex, OffsetEdit, Position, Range, TextEdit, WorkspaceEdit, apply_text_edits};
pub use vocabulary::{Vocabulary, VocabularyService};
