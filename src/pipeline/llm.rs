//! Inference: the engine seam and its VLM-provider implementation.
//!
//! [`InferenceEngine`] is the only thing the orchestrator knows about the
//! model. It is built once at startup (see [`build_engine`]) and shared as an
//! `Arc<dyn InferenceEngine>` by every request; nothing is reloaded per
//! request. Tests substitute a stub that returns a canned transcript.
//!
//! There is no retry loop: the first failure is returned as
//! [`ChartInsightError::ModelError`].

use crate::config::AnalysisConfig;
use crate::error::ChartInsightError;
use crate::pipeline::encode::encode_chart;
use crate::prompts::render_transcript;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A multimodal model that can describe a chart.
///
/// `analyze` returns the raw decoded output, including chat-template role
/// markers; [`crate::pipeline::extract`] isolates the reply.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn analyze(&self, image: &DynamicImage, prompt: &str)
        -> Result<String, ChartInsightError>;

    /// Short label for logs.
    fn name(&self) -> &str {
        "engine"
    }
}

/// Engine backed by an `edgequake-llm` vision provider.
pub struct LlmInferenceEngine {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmInferenceEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        build_options(self.temperature, self.max_tokens)
    }
}

#[async_trait]
impl InferenceEngine for LlmInferenceEngine {
    /// Send one user turn (prompt text + chart) and render the exchange as a
    /// decoded transcript.
    async fn analyze(
        &self,
        image: &DynamicImage,
        prompt: &str,
    ) -> Result<String, ChartInsightError> {
        let start = Instant::now();
        let image_data = encode_chart(image)
            .map_err(|e| ChartInsightError::model(format!("failed to encode chart: {e}")))?;

        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let options = self.options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ChartInsightError::model(format!("{}", e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(render_transcript(prompt, &response.content))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Build `CompletionOptions` from the configured sampling knobs.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Construct the process-wide engine from configuration.
///
/// Call once at startup and share the returned handle.
pub fn build_engine(config: &AnalysisConfig) -> Result<Arc<dyn InferenceEngine>, ChartInsightError> {
    let (provider, label) = resolve_provider(config)?;
    info!("Inference engine ready: {}", label);
    Ok(Arc::new(LlmInferenceEngine::new(provider, label, config)))
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ChartInsightError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ChartInsightError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, …) from the environment.
/// 3. **Environment pair** (`CHART_INSIGHT_PROVIDER` + `CHART_INSIGHT_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(
    config: &AnalysisConfig,
) -> Result<(Arc<dyn LLMProvider>, String), ChartInsightError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom provider".to_string()));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return Ok((create_vision_provider(name, model)?, format!("{name}/{model}")));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("CHART_INSIGHT_PROVIDER"),
        std::env::var("CHART_INSIGHT_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let label = format!("{prov}/{model}");
            return Ok((create_vision_provider(&prov, &model)?, label));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return Ok((
                create_vision_provider("openai", model)?,
                format!("openai/{model}"),
            ));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ChartInsightError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto-detected provider".to_string()))
}
