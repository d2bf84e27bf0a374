//! # chart-insight
//!
//! Describe a chart image with a Vision Language Model and package the image
//! plus the model's analysis into a PDF report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! chart image
//!  │
//!  ├─ 1. Input    decode upload / load file, stage a temp PNG
//!  ├─ 2. Encode   PNG → base64 ImageData
//!  ├─ 3. VLM      one call to gpt-4.1-nano / claude / gemini / …
//!  ├─ 4. Extract  isolate the assistant reply, drop non-Latin-1 chars
//!  ├─ 5. Report   title + scaled chart + wrapped text → PDF (spawn_blocking)
//!  └─ 6. Output   analysis text + report path + timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chart_insight::{AnalysisConfig, ChartAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let analyzer = ChartAnalyzer::from_config(AnalysisConfig::default())?;
//!     let output = analyzer.run_path("sales.png").await?;
//!     println!("{}", output.analysis);
//!     eprintln!("report: {}", output.report_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `chart-insight` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `web`   | on      | Enables [`web`]: the upload form and report download routes (axum) |
//!
//! Library-only use:
//! ```toml
//! chart-insight = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "web")]
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{clear, ChartAnalyzer, REPORT_PREFIX, REPORT_SUFFIX};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{ChartInsightError, ReportError};
pub use output::{AnalysisOutput, AnalysisStats, ClearedForm};
pub use pipeline::extract::extract;
pub use pipeline::layout::PageSize;
pub use pipeline::llm::{build_engine, InferenceEngine, LlmInferenceEngine};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
