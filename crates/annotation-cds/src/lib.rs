//! Annotation CDS
//!
//! CAP CDS source adapter. Compilation is delegated to an external
//! [`CdsCompiler`]; this crate prints annotation values in CDS syntax and
//! edits the comma separated annotation lists of CDS files in place.

pub mod adapter;
pub mod compiler;
pub mod printer;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use adapter::CdsServiceAdapter;
pub use compiler::{CdsCompilation, CdsCompiler, CompilerDiagnostic, CompilerMessage, Severity};
pub use printer::CdsPrinter;
pub use writer::CdsWriter;
