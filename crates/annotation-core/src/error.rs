//! Error types and handling for annotation editing operations

use indexmap::IndexMap;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for annotation editing operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resolution failures: unknown reference, unresolvable pointer,
    /// unsupported change combination, missing document for a uri
    #[error("{message}")]
    General { message: String },

    /// Validation after a save reported errors; the file cache was rolled back
    #[error("Compilation failed for {} file(s): {}", .messages.len(), format_files(.messages))]
    CompileError {
        messages: IndexMap<String, Vec<String>>,
    },

    /// Source text could not be parsed
    #[error("Parse error in '{uri}': {message}")]
    Parse { uri: String, message: String },

    /// Storage I/O errors raised by a file editor
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Discriminator for [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    General,
    CompileError,
    Parse,
    Io,
    Config,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::General => "General",
            ErrorCode::CompileError => "CompileError",
            ErrorCode::Parse => "Parse",
            ErrorCode::Io => "Io",
            ErrorCode::Config => "Config",
        }
    }

    /// Failures that force the file cache back to its pre-save snapshot
    /// when raised after edits were applied
    pub fn is_rollback_trigger(&self) -> bool {
        matches!(self, ErrorCode::CompileError | ErrorCode::Parse | ErrorCode::General)
    }
}

impl ApiError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::General { .. } => ErrorCode::General,
            ApiError::CompileError { .. } => ErrorCode::CompileError,
            ApiError::Parse { .. } => ErrorCode::Parse,
            ApiError::Io { .. } => ErrorCode::Io,
            ApiError::Config { .. } => ErrorCode::Config,
        }
    }

    /// Create a general (resolution) error
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Create a compile error from per-file messages
    pub fn compile_error(messages: IndexMap<String, Vec<String>>) -> Self {
        Self::CompileError { messages }
    }

    /// Create a parse error for a file
    pub fn parse(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Per-file messages carried by a compile error
    pub fn compile_messages(&self) -> Option<&IndexMap<String, Vec<String>>> {
        match self {
            ApiError::CompileError { messages } => Some(messages),
            _ => None,
        }
    }
}

fn format_files(messages: &IndexMap<String, Vec<String>>) -> String {
    messages.keys().cloned().collect::<Vec<_>>().join(", ")
}
