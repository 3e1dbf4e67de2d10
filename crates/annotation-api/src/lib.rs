//! Annotation API
//!
//! Facade over the annotation engine: pick the adapter for a service, queue
//! caller changes and save them as one validated, all-or-nothing batch.

pub mod editor;
pub mod preview;
pub mod project;
pub mod service;

pub use editor::{FileEditor, FsEditor, MemoryEditor};
pub use preview::{FilePreview, unified_diff};
pub use project::{Project, ProjectType, Service};
pub use service::{AnnotationService, AnnotationServiceBuilder, SaveResult};

pub use annotation_core::{
    AnnotationReference, ApiError, Change, ErrorCode, Result, SaveOptions, ServiceOptions,
    ServiceSchema, TextFile, VocabularyService,
};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("annotation=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
