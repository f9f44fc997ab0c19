//! Image engine trait and shared error type.
//!
//! The [`ImageEngine`] trait is the single seam between deferred builds and
//! pixel work: one call renders one artifact from a source file and a list of
//! typed steps.
//!
//! The production implementation is
//! [`RustEngine`](super::rust_backend::RustEngine), built on the `image`
//! crate and statically linked into the binary. Tests use a recording mock.

use super::params::RenderParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image engines.
///
/// `Sync` because builds for different fingerprints run concurrently on the
/// rayon pool and share one engine.
pub trait ImageEngine: Sync {
    /// Decode `params.source`, apply every step in order, and write the
    /// result to `params.output` with `params.encoding`.
    fn render(&self, params: &RenderParams) -> Result<(), EngineError>;
}
