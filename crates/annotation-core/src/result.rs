//! Result type alias for annotation editing operations

use crate::error::ApiError;

/// Standard Result type for annotation editing operations
pub type Result<T> = std::result::Result<T, ApiError>;
