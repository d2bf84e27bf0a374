//! Web form: upload a chart, read the analysis, download the report.
//!
//! | Method | Path              | Handler            |
//! |--------|-------------------|--------------------|
//! | GET    | `/`               | blank form         |
//! | POST   | `/analyze`        | multipart `image`  |
//! | POST   | `/clear`          | blank form         |
//! | GET    | `/reports/{name}` | generated PDF      |
//! | GET    | `/health`         | JSON status        |
//!
//! Pipeline errors are shown inside the form. `InvalidInput` answers 400,
//! everything else 500.
//!
//! Reports stay downloadable for [`AppState::report_ttl`]. Expired ones are
//! deleted before each analysis and by a background sweep while serving.

use crate::analyze::{clear, ChartAnalyzer, REPORT_PREFIX, REPORT_SUFFIX};
use crate::error::ChartInsightError;
use crate::output::ClearedForm;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Multipart field carrying the chart.
pub const IMAGE_FIELD: &str = "image";

/// How long a generated report stays downloadable.
pub const DEFAULT_REPORT_TTL: Duration = Duration::from_secs(30 * 60);

/// Interval of the background report sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<ChartAnalyzer>,
    /// Reports older than this are deleted.
    pub report_ttl: Duration,
}

impl AppState {
    pub fn new(analyzer: ChartAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            report_ttl: DEFAULT_REPORT_TTL,
        }
    }

    pub fn with_report_ttl(mut self, ttl: Duration) -> Self {
        self.report_ttl = ttl;
        self
    }
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/clear", post(clear_form))
        .route("/reports/{name}", get(download_report))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving chart form on http://{}", listener.local_addr()?);

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            expire_reports(&sweeper).await;
        }
    });

    axum::serve(listener, router(state)).await
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn index() -> Html<String> {
    Html(render_page(&FormView::default()))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn clear_form() -> Html<String> {
    Html(render_page(&FormView::from(clear())))
}

async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(error_page(&ChartInsightError::invalid_input(format!(
                    "malformed upload: {e}"
                ))))
            }
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| {
            error_page(&ChartInsightError::invalid_input(format!(
                "failed to read upload: {e}"
            )))
        })?;
        info!("Received upload: {} bytes", bytes.len());
        upload = Some(bytes);
    }

    expire_reports(&state).await;

    let result = match upload {
        Some(bytes) if !bytes.is_empty() => state.analyzer.run_bytes(&bytes).await,
        _ => state.analyzer.run(None).await,
    };

    match result {
        Ok(output) => {
            let report = output
                .report_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned);
            Ok(Html(render_page(&FormView {
                analysis: output.analysis,
                report,
                error: None,
            })))
        }
        Err(e) => Err(error_page(&e)),
    }
}

async fn download_report(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !is_report_name(&name) {
        warn!("Rejected report request for {:?}", name);
        return Err((StatusCode::NOT_FOUND, "No such report".to_string()));
    }

    let path = state.analyzer.report_dir().join(&name);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            (StatusCode::NOT_FOUND, "No such report".to_string())
        } else {
            error!("Failed to read {}: {}", path.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read report".to_string(),
            )
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    ))
}

// ── Report retention ────────────────────────────────────────────────────

/// Delete generated reports in `dir` whose modification time is at least
/// `ttl` ago. Other files are left alone. Returns how many were removed.
pub async fn sweep_reports(dir: &FsPath, ttl: Duration) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_report_name) {
            continue;
        }
        let age = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().unwrap_or_default(),
            Err(_) => continue,
        };
        if age < ttl {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", entry.path().display(), e),
        }
    }
    Ok(removed)
}

async fn expire_reports(state: &AppState) {
    let dir = state.analyzer.report_dir();
    match sweep_reports(&dir, state.report_ttl).await {
        Ok(0) => {}
        Ok(n) => info!("Removed {} expired report(s) from {}", n, dir.display()),
        Err(e) => warn!("Report sweep of {} failed: {}", dir.display(), e),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Only names this server generated, with no path components.
pub fn is_report_name(name: &str) -> bool {
    name.starts_with(REPORT_PREFIX)
        && name.ends_with(REPORT_SUFFIX)
        && name.len() > REPORT_PREFIX.len() + REPORT_SUFFIX.len()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &ChartInsightError) -> StatusCode {
    if err.is_user_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn error_page(err: &ChartInsightError) -> (StatusCode, Html<String>) {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Analysis failed: {}", err);
    } else {
        warn!("Rejected request: {}", err);
    }
    let view = FormView {
        error: Some(err.to_string()),
        ..FormView::default()
    };
    (status, Html(render_page(&view)))
}

#[derive(Debug, Default)]
struct FormView {
    analysis: String,
    /// File name under `/reports/`.
    report: Option<String>,
    error: Option<String>,
}

impl From<ClearedForm> for FormView {
    fn from(form: ClearedForm) -> Self {
        Self {
            analysis: form.analysis,
            report: form
                .report
                .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_owned)),
            error: None,
        }
    }
}

fn render_page(view: &FormView) -> String {
    let error = view
        .error
        .as_deref()
        .map(|e| format!("<p class=\"error\">{}</p>\n", html_escape(e)))
        .unwrap_or_default();
    let report = view
        .report
        .as_deref()
        .map(|name| {
            let name = html_escape(name);
            format!("<p><a href=\"/reports/{name}\" download>Download PDF report</a></p>\n")
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Chart Analysis Report</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }}
textarea {{ width: 100%; min-height: 12rem; }}
.error {{ color: #b00020; }}
details {{ margin-top: 2rem; }}
</style>
</head>
<body>
<h1>Chart Analysis Report</h1>
<p>Upload a chart image and get an analysis with a PDF report.</p>
{error}<form method="post" action="/analyze" enctype="multipart/form-data">
<input type="file" name="{field}" accept="image/*">
<button type="submit">Analyze</button>
</form>
<form method="post" action="/clear">
<button type="submit">Clear</button>
</form>
<h2>Analysis</h2>
<textarea readonly>{analysis}</textarea>
{report}<details>
<summary>About This Project</summary>
<p>This application sends an uploaded chart image to a vision-language model
and returns a plain-language explanation of it. It also produces a
downloadable PDF report containing the uploaded chart and the written
analysis.</p>
<h3>Key Features</h3>
<ul>
<li>Support for various chart types (bar, line, pie and more)</li>
<li>Natural language insights</li>
<li>PDF report export</li>
</ul>
<h3>Ideal For</h3>
<ul>
<li>Data analysts</li>
<li>Business professionals</li>
<li>Educators and students</li>
</ul>
<p>Built with axum, lopdf and edgequake-llm.</p>
</details>
</body>
</html>
"#,
        error = error,
        field = IMAGE_FIELD,
        analysis = html_escape(&view.analysis),
        report = report,
    )
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names() {
        assert!(is_report_name("chart-analysis-abc123.pdf"));
        assert!(!is_report_name("chart-analysis-.pdf"));
        assert!(!is_report_name("chart-upload-abc.png"));
        assert!(!is_report_name("chart-analysis-../../etc/passwd.pdf"));
        assert!(!is_report_name("chart-analysis-a\\b.pdf"));
        assert!(!is_report_name("other.pdf"));
    }

    #[test]
    fn invalid_input_is_bad_request() {
        let e = ChartInsightError::invalid_input("no image supplied");
        assert_eq!(status_for(&e), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&ChartInsightError::model("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn escape_markup() {
        assert_eq!(html_escape("<b>\"a&b\"</b>"), "&lt;b&gt;&quot;a&amp;b&quot;&lt;/b&gt;");
    }

    #[test]
    fn page_contains_form_and_analysis() {
        let html = render_page(&FormView {
            analysis: "Sales <rose>".into(),
            report: Some("chart-analysis-x.pdf".into()),
            error: None,
        });
        assert!(html.contains("name=\"image\""));
        assert!(html.contains("Sales &lt;rose&gt;"));
        assert!(html.contains("/reports/chart-analysis-x.pdf"));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn page_has_collapsed_about_section() {
        let html = render_page(&FormView::default());
        assert!(html.contains("<details>\n<summary>About This Project</summary>"));
        assert!(!html.contains("<details open"));
    }

    #[test]
    fn cleared_form_renders_blank() {
        let html = render_page(&FormView::from(clear()));
        assert!(html.contains("<textarea readonly></textarea>"));
        assert!(!html.contains("Download PDF report"));
    }
}
