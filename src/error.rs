//! Error types for the chart-insight library.
//!
//! Two error types reflect two layers of the pipeline:
//!
//! * [`ChartInsightError`]: returned from the [`crate::analyze`] entry
//!   points. Every variant is local to one request; the inference engine
//!   stays loaded and the next request is unaffected.
//!
//! * [`ReportError`]: raised by the PDF builder. Wrapped into
//!   [`ChartInsightError::Report`] by the orchestrator, but also usable on its
//!   own when calling [`crate::pipeline::report::build_report`] directly.
//!
//! Unencodable characters in model output are never an error: they are
//! dropped by [`crate::pipeline::extract`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the chart-insight pipeline.
#[derive(Debug, Error)]
pub enum ChartInsightError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No image was supplied, or the upload could not be decoded.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The inference engine failed or returned unusable output. Not retried.
    #[error("Model error: {message}")]
    ModelError { message: String },

    /// The configured provider could not be built (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A temporary file could not be created, written or read.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PDF report could not be produced.
    #[error(transparent)]
    Report(#[from] ReportError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChartInsightError {
    /// Shorthand for [`ChartInsightError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ChartInsightError::ModelError`].
    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelError {
            message: message.into(),
        }
    }

    /// `true` when the caller, not the system, is at fault.
    ///
    /// The web form maps these to `400 Bad Request`.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::FileNotFound { .. } | Self::PermissionDenied { .. }
        )
    }
}

/// Failures while laying out or writing the PDF report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The chart could not be encoded to PNG for staging.
    #[error("Failed to encode chart image: {0}")]
    ImageEncoding(#[from] image::ImageError),

    /// lopdf rejected the document structure.
    #[error("PDF serialisation failed: {0}")]
    Pdf(String),

    /// The report could not be written to `path`.
    #[error("Failed to write report '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
