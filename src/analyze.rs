//! Pipeline orchestration: the `run` and `clear` entry points.
//!
//! [`ChartAnalyzer`] composes the stages in [`crate::pipeline`] for a single
//! chart:
//!
//! ```text
//! image ─▶ stage temp PNG ─▶ engine.analyze ─▶ extract ─▶ build_report ─▶ (text, path)
//!          (dropped on exit)                              (spawn_blocking)
//! ```
//!
//! The analyzer holds only the injected engine and immutable config, so one
//! instance can serve concurrent requests; each request gets its own
//! uniquely named temp files.

use crate::config::AnalysisConfig;
use crate::error::ChartInsightError;
use crate::output::{AnalysisOutput, AnalysisStats, ClearedForm};
use crate::pipeline::llm::{build_engine, InferenceEngine};
use crate::pipeline::{extract, input, report};
use crate::progress::Stage;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Filename prefix of generated reports.
pub const REPORT_PREFIX: &str = "chart-analysis-";
/// Filename suffix of generated reports.
pub const REPORT_SUFFIX: &str = ".pdf";

/// Runs the chart → analysis → PDF pipeline.
#[derive(Clone)]
pub struct ChartAnalyzer {
    engine: Arc<dyn InferenceEngine>,
    config: AnalysisConfig,
}

impl std::fmt::Debug for ChartAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartAnalyzer")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ChartAnalyzer {
    /// Wrap an already-constructed engine.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: AnalysisConfig) -> Self {
        Self { engine, config }
    }

    /// Build the engine from `config` (provider resolution happens once, here).
    pub fn from_config(config: AnalysisConfig) -> Result<Self, ChartInsightError> {
        let engine = build_engine(&config)?;
        Ok(Self::new(engine, config))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Directory where reports are written.
    pub fn report_dir(&self) -> PathBuf {
        self.config.effective_report_dir()
    }

    /// Analyse `image` and write the PDF report.
    ///
    /// # Errors
    /// - [`ChartInsightError::InvalidInput`] when `image` is `None` or empty;
    ///   no file is created.
    /// - [`ChartInsightError::ModelError`] when the engine fails or returns
    ///   blank output. Not retried.
    /// - [`ChartInsightError::Io`] / [`ChartInsightError::Report`] when a temp
    ///   file cannot be written.
    ///
    /// The staged PNG is deleted on every path; the report is kept only on
    /// success.
    pub async fn run(&self, image: Option<DynamicImage>) -> Result<AnalysisOutput, ChartInsightError> {
        let total_start = Instant::now();

        // ── Step 1: Validate ─────────────────────────────────────────────────
        let image = image.ok_or_else(|| ChartInsightError::invalid_input("no image supplied"))?;
        input::ensure_has_pixels(&image)?;
        let (image_width, image_height) = (image.width(), image.height());
        let dir = self.report_dir();
        info!(
            "Analysing {}x{} chart with {}",
            image_width,
            image_height,
            self.engine.name()
        );

        // ── Step 2: Stage temp copy ──────────────────────────────────────────
        let t = self.stage_start(Stage::Staging);
        let staged = input::stage_image(&image, &dir)?;
        self.stage_complete(Stage::Staging, t);

        // ── Step 3: Inference ────────────────────────────────────────────────
        let t = self.stage_start(Stage::Inference);
        let raw = self
            .engine
            .analyze(&image, self.config.effective_prompt())
            .await
            .map_err(into_model_error)?;
        if raw.trim().is_empty() {
            return Err(ChartInsightError::model("model returned no output"));
        }
        let inference_ms = self.stage_complete(Stage::Inference, t);
        debug!("Raw model output: {} bytes", raw.len());

        // ── Step 4: Extract reply ────────────────────────────────────────────
        let t = self.stage_start(Stage::Extraction);
        let analysis = extract::extract(&raw);
        if analysis.is_empty() {
            warn!("Model reply is empty after extraction; report will have no body");
        }
        self.stage_complete(Stage::Extraction, t);

        // ── Step 5: Build report ─────────────────────────────────────────────
        let t = self.stage_start(Stage::Report);
        let (report_path, report_bytes) =
            write_report(image, analysis.clone(), self.config.page_size, dir).await?;
        let report_ms = self.stage_complete(Stage::Report, t);

        let staged_path = staged.path().to_path_buf();
        drop(staged);
        debug!("Removed staged chart {}", staged_path.display());

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_analysis_complete(analysis.len(), report_bytes);
        }

        let stats = AnalysisStats {
            image_width,
            image_height,
            inference_ms,
            report_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
            report_bytes,
        };
        info!(
            "Analysis complete: {} chars, report {} ({} bytes, {}ms total)",
            analysis.len(),
            report_path.display(),
            report_bytes,
            stats.total_ms
        );

        Ok(AnalysisOutput {
            analysis,
            report_path,
            stats,
        })
    }

    /// Decode uploaded bytes, then [`run`](Self::run).
    pub async fn run_bytes(&self, bytes: &[u8]) -> Result<AnalysisOutput, ChartInsightError> {
        let image = input::decode_image(bytes)?;
        self.run(Some(image)).await
    }

    /// Load a chart from disk, then [`run`](Self::run).
    pub async fn run_path(&self, path: impl AsRef<Path>) -> Result<AnalysisOutput, ChartInsightError> {
        let image = input::load_image(path.as_ref())?;
        self.run(Some(image)).await
    }

    /// Synchronous wrapper around [`run`](Self::run).
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn run_blocking(&self, image: Option<DynamicImage>) -> Result<AnalysisOutput, ChartInsightError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ChartInsightError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run(image))
    }

    fn stage_start(&self, stage: Stage) -> Instant {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
        Instant::now()
    }

    fn stage_complete(&self, stage: Stage, started: Instant) -> u64 {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!("Stage {} took {}ms", stage, elapsed_ms);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, elapsed_ms);
        }
        elapsed_ms
    }
}

/// Reset signal for the form: no image, no text, no report.
pub fn clear() -> ClearedForm {
    ClearedForm::default()
}

/// Any engine failure surfaces as a model error.
fn into_model_error(e: ChartInsightError) -> ChartInsightError {
    match e {
        ChartInsightError::ModelError { .. } => e,
        other => ChartInsightError::model(other.to_string()),
    }
}

/// Lay out and write the PDF on the blocking pool.
///
/// The report file is created under a unique name and only persisted once
/// fully written; on failure it is removed.
async fn write_report(
    image: DynamicImage,
    analysis: String,
    page_size: crate::pipeline::layout::PageSize,
    dir: PathBuf,
) -> Result<(PathBuf, u64), ChartInsightError> {
    tokio::task::spawn_blocking(move || {
        let file = tempfile::Builder::new()
            .prefix(REPORT_PREFIX)
            .suffix(REPORT_SUFFIX)
            .tempfile_in(&dir)
            .map_err(|source| ChartInsightError::Io {
                path: dir.clone(),
                source,
            })?;

        let bytes = report::build_report(&image, &analysis, page_size, file.path())?;

        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| ChartInsightError::Io {
                path: e.path.to_path_buf(),
                source: e.error,
            })?;
        Ok((path, bytes))
    })
    .await
    .map_err(|e| ChartInsightError::Internal(format!("Report task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl InferenceEngine for Fixed {
        async fn analyze(&self, _: &DynamicImage, _: &str) -> Result<String, ChartInsightError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl InferenceEngine for Failing {
        async fn analyze(&self, _: &DynamicImage, _: &str) -> Result<String, ChartInsightError> {
            Err(ChartInsightError::Internal("GPU fell over".into()))
        }
    }

    fn analyzer(engine: impl InferenceEngine + 'static, dir: &Path) -> ChartAnalyzer {
        let config = AnalysisConfig::builder().report_dir(dir).build().unwrap();
        ChartAnalyzer::new(Arc::new(engine), config)
    }

    #[test]
    fn clear_is_blank_and_idempotent() {
        assert!(clear().is_blank());
        assert!(clear().is_blank());
        assert_eq!(clear().analysis, "");
    }

    #[test]
    fn non_model_errors_become_model_errors() {
        let e = into_model_error(ChartInsightError::Internal("boom".into()));
        assert!(matches!(e, ChartInsightError::ModelError { ref message } if message.contains("boom")));
    }

    #[tokio::test]
    async fn blank_output_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = analyzer(Fixed("   \n"), dir.path());
        let err = a.run(Some(DynamicImage::new_rgb8(4, 4))).await.unwrap_err();
        assert!(matches!(err, ChartInsightError::ModelError { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn engine_failure_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = analyzer(Failing, dir.path());
        let err = a.run(Some(DynamicImage::new_rgb8(4, 4))).await.unwrap_err();
        assert!(err.to_string().contains("GPU fell over"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_image_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = analyzer(Fixed("Assistant: hi"), dir.path());
        let err = a.run(Some(DynamicImage::new_rgb8(0, 0))).await.unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn run_blocking_outside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let a = analyzer(Fixed("Assistant: Flat."), dir.path());
        let out = a.run_blocking(Some(DynamicImage::new_rgb8(10, 5))).unwrap();
        assert_eq!(out.analysis, "Flat.");
        assert!(out.report_path.starts_with(dir.path()));
    }

    #[test]
    fn debug_shows_engine_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = analyzer(Fixed(""), dir.path());
        assert!(format!("{a:?}").contains("engine"));
    }
}
