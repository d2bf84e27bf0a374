//! Configuration types for chart analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. The config is cheap to clone and is shared by
//! the CLI and the web form.

use crate::error::ChartInsightError;
use crate::pipeline::layout::PageSize;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one analyzer instance.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use chart_insight::{AnalysisConfig, PageSize};
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4.1-mini")
///     .max_tokens(800)
///     .page_size(PageSize::Letter)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 800);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Instruction sent with the chart. If None, uses
    /// [`crate::prompts::DEFAULT_ANALYSIS_PROMPT`].
    pub prompt: Option<String>,

    /// LLM model ID. Default: provider-specific (`gpt-4.1-nano` for OpenAI).
    pub model: Option<String>,

    /// Provider name (`openai`, `anthropic`, `gemini`, `ollama`, …).
    /// Auto-detected from API key env vars when `None`.
    pub provider_name: Option<String>,

    /// Pre-built provider. Takes priority over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 500.
    ///
    /// A chart summary rarely needs more than a few paragraphs; the report
    /// body flows onto extra pages if it does.
    pub max_tokens: usize,

    /// Report page size. Default: [`PageSize::A4`].
    pub page_size: PageSize,

    /// Directory for staged images and generated reports.
    /// Default: the system temp directory.
    pub report_dir: Option<PathBuf>,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 500,
            page_size: PageSize::default(),
            report_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("page_size", &self.page_size)
            .field("report_dir", &self.report_dir)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt actually sent to the model.
    pub fn effective_prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_ANALYSIS_PROMPT)
    }

    /// Directory where temp images and reports are created.
    pub fn effective_report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.report_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ChartInsightError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ChartInsightError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref p) = c.prompt {
            if p.trim().is_empty() {
                return Err(ChartInsightError::InvalidConfig(
                    "prompt must not be blank".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
