//! CodeSure: local AI assistance for prior-authorization workflows.
//!
//! Code validation, candidate suggestion, attribute extraction, document
//! summarization, note drafting, and best-effort translation, all backed by
//! optionally-present local AI capabilities. Every operation degrades
//! gracefully when a capability is absent, slow, or returns unusable output.

pub mod capability;
pub mod config;
pub mod dataset;
pub mod deadline;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod note;
pub mod sanitize;
pub mod score;
pub mod summarize;
pub mod tokens;
pub mod translate;
pub mod validate;

pub use error::AiError;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration tests. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codesure=info")),
        )
        .try_init();
}
