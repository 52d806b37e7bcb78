//! Error types for document assembly and rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a render operation.
///
/// Per-file read problems are not errors: they surface as
/// [`SectionOutcome::Skipped`](crate::SectionOutcome::Skipped) and the batch carries on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Typst rejected the generated markup.
    #[error("Typst compilation failed: {0}")]
    Compilation(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
