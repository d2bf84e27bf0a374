//! CLI binary for chart-insight.
//!
//! A thin shim over the library crate: `analyze` runs one chart through the
//! pipeline, `serve` starts the web form.

use anyhow::{Context, Result};
use chart_insight::web::{self, AppState};
use chart_insight::{
    AnalysisConfig, AnalysisProgressCallback, ChartAnalyzer, PageSize, ProgressCallback, Stage,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running stage and logs each finished one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.set_message("loading chart…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Staging => "staging chart…",
            Stage::Inference => "waiting for the model…",
            Stage::Extraction => "extracting reply…",
            Stage::Report => "writing PDF…",
        };
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_analysis_complete(&self, analysis_len: usize, report_bytes: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chars of analysis, {} byte report",
            green("✔"),
            bold(&analysis_len.to_string()),
            report_bytes
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a chart, print the text, keep the PDF
  chart-insight analyze sales.png -o sales-report.pdf

  # JSON output with timings
  chart-insight analyze --json sales.png > analysis.json

  # Use a specific model
  chart-insight --provider openai --model gpt-4.1-mini analyze sales.png

  # Start the upload form
  chart-insight serve --addr 0.0.0.0:7860

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  GEMINI_API_KEY              Google Gemini API key
  CHART_INSIGHT_PROVIDER      Provider (openai, anthropic, gemini, ollama)
  CHART_INSIGHT_MODEL         Model ID
  CHART_INSIGHT_PROMPT        Instruction sent with the chart
  CHART_INSIGHT_REPORT_DIR    Where staged images and reports are written
  CHART_INSIGHT_PAGE_SIZE     a4 or letter
  CHART_INSIGHT_ADDR          Listen address for `serve`
  CHART_INSIGHT_REPORT_TTL_MINS  Minutes `serve` keeps generated reports
  RUST_LOG                    Log filter (overrides -v / -q)
"#;

/// Analyse chart images with Vision LLMs and produce PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "chart-insight",
    version,
    about = "Analyse chart images with Vision LLMs and produce PDF reports",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one chart image.
    Analyze {
        /// Chart image (PNG, JPEG).
        image: PathBuf,

        /// Copy the generated report to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output structured JSON (AnalysisOutput) instead of plain text.
        #[arg(long)]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long)]
        no_progress: bool,
    },
    /// Serve the upload form.
    Serve {
        /// Listen address.
        #[arg(long, env = "CHART_INSIGHT_ADDR", default_value = "127.0.0.1:7860")]
        addr: String,

        /// Minutes a generated report stays downloadable.
        #[arg(long, env = "CHART_INSIGHT_REPORT_TTL_MINS", default_value_t = 30)]
        report_ttl_mins: u64,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "CHART_INSIGHT_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, global = true, env = "CHART_INSIGHT_MODEL")]
    model: Option<String>,

    /// Instruction sent with the chart.
    #[arg(long, global = true, env = "CHART_INSIGHT_PROMPT")]
    prompt: Option<String>,

    /// Max tokens the model may generate.
    #[arg(long, global = true, env = "CHART_INSIGHT_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "CHART_INSIGHT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Directory for staged images and generated reports.
    #[arg(long, global = true, env = "CHART_INSIGHT_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Report page size: a4 or letter.
    #[arg(long, global = true, env = "CHART_INSIGHT_PAGE_SIZE", default_value = "a4",
          value_parser = parse_page_size)]
    page_size: PageSize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

fn parse_page_size(s: &str) -> std::result::Result<PageSize, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs during `analyze`; `serve` logs requests.
    let show_progress = match cli.command {
        Command::Analyze {
            json, no_progress, ..
        } => !cli.common.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.common.verbose {
        "debug"
    } else if cli.common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli.common, progress_cb)?;
    let analyzer = ChartAnalyzer::from_config(config).context("Failed to set up the model")?;

    match cli.command {
        Command::Analyze {
            image,
            output,
            json,
            ..
        } => {
            let mut result = analyzer
                .run_path(&image)
                .await
                .with_context(|| format!("Analysis of {} failed", image.display()))?;

            if let Some(ref dest) = output {
                tokio::fs::copy(&result.report_path, dest)
                    .await
                    .with_context(|| format!("Failed to write report to {}", dest.display()))?;
                if let Err(e) = tokio::fs::remove_file(&result.report_path).await {
                    tracing::warn!(
                        "Could not remove {}: {}",
                        result.report_path.display(),
                        e
                    );
                }
                result.report_path = dest.clone();
            }

            if json {
                let json =
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.analysis.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.analysis.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if !cli.common.quiet {
                eprintln!(
                    "{}  {}ms  →  {}",
                    green("✔"),
                    result.stats.total_ms,
                    bold(&result.report_path.display().to_string()),
                );
            }
        }
        Command::Serve {
            addr,
            report_ttl_mins,
        } => {
            let state = AppState::new(analyzer)
                .with_report_ttl(Duration::from_secs(report_ttl_mins.saturating_mul(60)));
            web::serve(&addr, state)
                .await
                .with_context(|| format!("Server on {addr} failed"))?;
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(args: &CommonArgs, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .page_size(args.page_size);

    if let Some(ref prompt) = args.prompt {
        builder = builder.prompt(prompt.clone());
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref dir) = args.report_dir {
        builder = builder.report_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
