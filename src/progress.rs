//! Progress-callback trait for per-stage analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The CLI turns them into
//! a spinner; the web form leaves them unset.
//!
//! # Example
//!
//! ```rust
//! use chart_insight::{AnalysisConfig, AnalysisProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl AnalysisProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage reported to [`AnalysisProgressCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing the chart to a temporary PNG.
    Staging,
    /// Waiting for the vision model.
    Inference,
    /// Isolating and sanitising the reply.
    Extraction,
    /// Laying out and writing the PDF.
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Staging => "staging",
            Stage::Inference => "inference",
            Stage::Extraction => "extraction",
            Stage::Report => "report",
        };
        f.write_str(s)
    }
}

/// Called by the analyzer as it processes one chart.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: the web form
/// shares one analyzer across concurrent requests.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called once when the report has been written.
    ///
    /// # Arguments
    /// * `analysis_len`: byte length of the extracted analysis
    /// * `report_bytes`: size of the written PDF
    fn on_analysis_complete(&self, analysis_len: usize, report_bytes: u64) {
        let _ = (analysis_len, report_bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
