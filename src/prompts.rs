//! Prompt and report wording.
//!
//! Every fixed string the pipeline sends to the model or prints into the
//! report lives here, so tests can import them instead of repeating literals.

/// Instruction sent alongside the chart image.
///
/// Used when [`crate::config::AnalysisConfig::prompt`] is `None`.
pub const DEFAULT_ANALYSIS_PROMPT: &str =
    "Please analyze this chart like a professional data analyst and explain the insights clearly.";

/// Role marker that precedes the generated reply in a decoded chat transcript.
pub const ASSISTANT_MARKER: &str = "Assistant:";

/// Role marker for the user turn in a decoded chat transcript.
pub const USER_MARKER: &str = "User:";

/// Report heading.
pub const REPORT_TITLE: &str = "Chart Analysis Report";

/// Label above the embedded chart.
pub const IMAGE_SECTION_LABEL: &str = "Uploaded Chart";

/// Label above the analysis body.
pub const INSIGHTS_SECTION_LABEL: &str = "AI-Generated Insights";

/// Render one user/assistant exchange the way a chat template decodes it.
///
/// Remote providers return only the assistant content. Engine output always
/// carries both role markers, as a fully decoded conversation would.
pub fn render_transcript(prompt: &str, reply: &str) -> String {
    format!("{USER_MARKER} {prompt}\n{ASSISTANT_MARKER} {reply}")
}
