//! Annotation XML
//!
//! EDMX source adapter: a position-preserving XML document model, the
//! generic annotation file view derived from it, and a writer that turns
//! annotation file changes into minimal, formatting-preserving text edits.

pub mod adapter;
pub mod annotation_file;
pub mod document;
pub mod printer;
pub mod references;
pub mod writer;

pub use adapter::XmlServiceAdapter;
pub use annotation_file::{XmlAnnotationFile, metadata_summary, to_generic_element};
pub use document::{XmlAttribute, XmlComment, XmlDocument, XmlElement, XmlText};
pub use printer::XmlPrinter;
pub use writer::{XmlDocumentChange, XmlWriter};
