//! Boundary to the external CDS compiler
//!
//! The compiler turns the CDS sources of a service into generic annotation
//! files. Ranges in those files point into the CDS text and follow the layout
//! the [`CdsWriter`](crate::writer::CdsWriter) edits against:
//!
//! * `Target::range` spans the whole `annotate ... ;` statement and
//!   `Target::terms_range` the text between the parentheses of `@( ... )`.
//! * A term spans `UI.LineItem #Q : value`; its `Term` and `Qualifier`
//!   attribute value ranges cover the name and the qualifier.
//! * `Collection` and `Record` span their brackets or braces, with
//!   `content_range` between them. A record's `$Type` is the `Type`
//!   attribute, `name_range` covering `$Type` and `value_range` the literal.
//! * A property value spans `Name : value`.
//! * Attribute-notation values have `value_range` on the literal as written
//!   (quotes included); collection items holding primitives span the literal.

use annotation_core::{AnnotationFile, FileCache, MetadataSummary, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Severity of a compiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerDiagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Diagnostics of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerMessage {
    pub has_syntax_errors: bool,
    pub messages: Vec<CompilerDiagnostic>,
}

impl CompilerMessage {
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self {
            has_syntax_errors: true,
            messages: vec![CompilerDiagnostic {
                severity: Severity::Error,
                message: message.into(),
            }],
        }
    }
}

/// Result of compiling the sources of a service
#[derive(Debug, Clone, Default)]
pub struct CdsCompilation {
    pub metadata: MetadataSummary,
    pub annotation_files: Vec<AnnotationFile>,
    /// Keyed by path relative to the project root; files outside the root
    /// start with `../`
    pub messages: IndexMap<String, CompilerMessage>,
}

#[async_trait]
pub trait CdsCompiler: Send + Sync {
    /// Compile `sources` (uri -> text) of the project rooted at `project_root`
    async fn compile(&self, project_root: &str, sources: &FileCache) -> Result<CdsCompilation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_json() {
        let message: CompilerMessage = serde_json::from_str(
            r#"{"hasSyntaxErrors": true, "messages": [{"severity": "error", "message": "Unexpected ';'"}]}"#,
        )
        .unwrap();
        assert_eq!(message, CompilerMessage::syntax_error("Unexpected ';'"));

        let empty: CompilerMessage = serde_json::from_str("{}").unwrap();
        assert!(!empty.has_syntax_errors);
    }
}
