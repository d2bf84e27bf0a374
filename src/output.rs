//! Result types returned by [`crate::analyze::ChartAnalyzer`].

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The outcome of one successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Cleaned analysis text, as shown to the user and printed in the report.
    pub analysis: String,
    /// Path of the generated PDF. The caller owns it and is responsible for
    /// deleting it.
    pub report_path: PathBuf,
    pub stats: AnalysisStats,
}

/// Timings and sizes for one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub image_width: u32,
    pub image_height: u32,
    /// Time spent waiting for the model.
    pub inference_ms: u64,
    /// Time spent laying out and writing the PDF.
    pub report_ms: u64,
    pub total_ms: u64,
    pub report_bytes: u64,
}

/// Blank form state returned by [`crate::analyze::clear`]: no image, no
/// text, no report.
#[derive(Debug, Clone, Default)]
pub struct ClearedForm {
    pub image: Option<DynamicImage>,
    pub analysis: String,
    pub report: Option<PathBuf>,
}

impl ClearedForm {
    /// `true` when every field is empty.
    pub fn is_blank(&self) -> bool {
        self.image.is_none() && self.analysis.is_empty() && self.report.is_none()
    }
}
