//! Pipeline integration tests with a stub inference engine.
//!
//! No network access: every engine here returns a canned transcript, so the
//! tests exercise staging, extraction, layout and PDF writing for real.

use async_trait::async_trait;
use chart_insight::pipeline::input::staged_files;
use chart_insight::prompts::DEFAULT_ANALYSIS_PROMPT;
use chart_insight::{
    clear, AnalysisConfig, AnalysisProgressCallback, ChartAnalyzer, ChartInsightError,
    InferenceEngine, Stage, REPORT_PREFIX,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Returns a fixed transcript and remembers the prompt it was sent.
struct StubEngine {
    reply: String,
    seen_prompt: Mutex<Option<String>>,
}

impl StubEngine {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            seen_prompt: Mutex::new(None),
        })
    }
}

#[async_trait]
impl InferenceEngine for StubEngine {
    async fn analyze(&self, _image: &DynamicImage, prompt: &str) -> Result<String, ChartInsightError> {
        *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct BrokenEngine;

#[async_trait]
impl InferenceEngine for BrokenEngine {
    async fn analyze(&self, _image: &DynamicImage, _prompt: &str) -> Result<String, ChartInsightError> {
        Err(ChartInsightError::model("upstream returned 503"))
    }
}

/// Counts calls and answers with a short transcript.
#[derive(Default)]
struct CountingEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl InferenceEngine for CountingEngine {
    async fn analyze(&self, _image: &DynamicImage, _prompt: &str) -> Result<String, ChartInsightError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("Assistant: A thin strip.".to_string())
    }
}

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<Stage>>,
    completed: Mutex<Vec<Stage>>,
    finished: Mutex<Option<(usize, u64)>>,
}

impl AnalysisProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
        self.completed.lock().unwrap().push(stage);
    }

    fn on_analysis_complete(&self, analysis_len: usize, report_bytes: u64) {
        *self.finished.lock().unwrap() = Some((analysis_len, report_bytes));
    }
}

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn chart(w: u32, h: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            Rgba([30, 90, 200, 255])
        } else {
            Rgba([255, 255, 255, 0])
        }
    });
    DynamicImage::ImageRgba8(img)
}

fn analyzer_in(dir: &Path, engine: Arc<dyn InferenceEngine>) -> ChartAnalyzer {
    let config = AnalysisConfig::builder()
        .report_dir(dir)
        .build()
        .expect("valid config");
    ChartAnalyzer::new(engine, config)
}

fn reports_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(REPORT_PREFIX))
        })
        .collect()
}

fn page_count(path: &Path) -> usize {
    let bytes = std::fs::read(path).unwrap();
    lopdf::Document::load_mem(&bytes).unwrap().get_pages().len()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn analysis_text_and_report_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine::new("User: What does this chart show?\nAssistant: Sales rose 12% in Q2.");
    let analyzer = analyzer_in(dir.path(), engine.clone());

    let out = analyzer.run(Some(chart(400, 200))).await.unwrap();

    assert_eq!(out.analysis, "Sales rose 12% in Q2.");
    assert!(out.report_path.starts_with(dir.path()));
    let bytes = std::fs::read(&out.report_path).unwrap();
    assert!(!bytes.is_empty());
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(out.stats.report_bytes, bytes.len() as u64);
    assert_eq!((out.stats.image_width, out.stats.image_height), (400, 200));
    assert_eq!(page_count(&out.report_path), 1);

    let sent = engine.seen_prompt.lock().unwrap().clone();
    assert_eq!(sent.as_deref(), Some(DEFAULT_ANALYSIS_PROMPT));
}

#[tokio::test]
async fn missing_image_is_invalid_input_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: unused"));

    let err = analyzer.run(None).await.unwrap_err();

    assert!(matches!(err, ChartInsightError::InvalidInput { .. }));
    assert!(reports_in(dir.path()).is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn staged_image_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: Flat trend."));

    analyzer.run(Some(chart(64, 64))).await.unwrap();

    assert!(staged_files(dir.path()).unwrap().is_empty());
    assert_eq!(reports_in(dir.path()).len(), 1);
}

#[tokio::test]
async fn model_failure_cleans_up_and_reports_model_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), Arc::new(BrokenEngine));

    let err = analyzer.run(Some(chart(64, 64))).await.unwrap_err();

    assert!(matches!(err, ChartInsightError::ModelError { .. }));
    assert!(err.to_string().contains("503"));
    assert!(staged_files(dir.path()).unwrap().is_empty());
    assert!(reports_in(dir.path()).is_empty());
}

#[tokio::test]
async fn missing_report_dir_is_io_error_before_inference() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let engine = Arc::new(CountingEngine::default());
    let analyzer = analyzer_in(&missing, engine.clone());

    let err = analyzer.run(Some(chart(64, 64))).await.unwrap_err();

    assert!(
        matches!(err, ChartInsightError::Io { ref path, .. } if path == &missing),
        "got {err:?}"
    );
    assert!(!err.is_user_error());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert!(!missing.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn very_wide_chart_still_produces_report() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(CountingEngine::default());
    let analyzer = analyzer_in(dir.path(), engine.clone());

    let out = analyzer.run(Some(chart(70_000, 2))).await.unwrap();

    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(out.analysis, "A thin strip.");
    assert_eq!((out.stats.image_width, out.stats.image_height), (70_000, 2));
    assert_eq!(page_count(&out.report_path), 1);
    assert!(staged_files(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn reply_without_marker_is_used_whole() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("  Revenue doubled.  "));

    let out = analyzer.run(Some(chart(50, 50))).await.unwrap();
    assert_eq!(out.analysis, "Revenue doubled.");
}

#[tokio::test]
async fn non_latin1_characters_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: Growth \u{1F4C8} of 5 \u{2192} 7, caf\u{e9}"));

    let out = analyzer.run(Some(chart(50, 50))).await.unwrap();

    assert!(out.analysis.chars().all(|c| (c as u32) <= 0xFF));
    assert!(out.analysis.contains("café"));
    assert!(out.report_path.exists());
}

#[tokio::test]
async fn portrait_chart_pushes_text_to_second_page() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: Tall bars."));

    let out = analyzer.run(Some(chart(200, 800))).await.unwrap();
    assert_eq!(page_count(&out.report_path), 2);
}

#[tokio::test]
async fn long_analysis_flows_onto_more_pages() {
    let dir = tempfile::tempdir().unwrap();
    let long = format!("Assistant: {}", "The quarterly series climbs steadily. ".repeat(200));
    let analyzer = analyzer_in(dir.path(), StubEngine::new(&long));

    let out = analyzer.run(Some(chart(400, 200))).await.unwrap();
    assert!(page_count(&out.report_path) >= 3);
}

#[tokio::test]
async fn upload_bytes_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: ok"));

    let mut png = std::io::Cursor::new(Vec::new());
    chart(30, 20)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();
    let out = analyzer.run_bytes(png.get_ref()).await.unwrap();
    assert_eq!(out.analysis, "ok");

    let err = analyzer.run_bytes(b"not an image").await.unwrap_err();
    assert!(matches!(err, ChartInsightError::InvalidInput { .. }));
}

#[tokio::test]
async fn missing_path_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_in(dir.path(), StubEngine::new("Assistant: ok"));

    let err = analyzer
        .run_path(dir.path().join("nope.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChartInsightError::FileNotFound { .. }));
}

#[tokio::test]
async fn concurrent_runs_get_distinct_reports() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = Arc::new(analyzer_in(dir.path(), StubEngine::new("Assistant: same")));

    let a = {
        let analyzer = Arc::clone(&analyzer);
        tokio::spawn(async move { analyzer.run(Some(chart(40, 40))).await })
    };
    let b = {
        let analyzer = Arc::clone(&analyzer);
        tokio::spawn(async move { analyzer.run(Some(chart(40, 40))).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_ne!(a.report_path, b.report_path);
    assert_eq!(reports_in(dir.path()).len(), 2);
}

#[tokio::test]
async fn progress_callback_sees_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .report_dir(dir.path())
        .progress_callback(recorder.clone() as Arc<dyn AnalysisProgressCallback>)
        .build()
        .unwrap();
    let analyzer = ChartAnalyzer::new(StubEngine::new("Assistant: Up."), config);

    let out = analyzer.run(Some(chart(40, 40))).await.unwrap();

    let expected = vec![Stage::Staging, Stage::Inference, Stage::Extraction, Stage::Report];
    assert_eq!(*recorder.started.lock().unwrap(), expected);
    assert_eq!(*recorder.completed.lock().unwrap(), expected);
    assert_eq!(
        *recorder.finished.lock().unwrap(),
        Some((3, out.stats.report_bytes))
    );
}

#[test]
fn clear_always_returns_blank_form() {
    for _ in 0..3 {
        let form = clear();
        assert!(form.image.is_none());
        assert_eq!(form.analysis, "");
        assert!(form.report.is_none());
    }
}
