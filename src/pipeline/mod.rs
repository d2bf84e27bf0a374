//! Pipeline stages for chart analysis.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others (the layout arithmetic in particular never needs
//! a model or a filesystem).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ extract ──▶ layout ──▶ report
//! (decode,   (PNG,     (VLM)   (reply,     (mm       (lopdf,
//!  stage)     base64)          Latin-1)    cursor)    write)
//! ```
//!
//! 1. [`input`]: decode uploads or load files; stage a temp PNG
//! 2. [`encode`]: PNG-encode and base64-wrap the chart for the API body
//! 3. [`llm`]: the [`llm::InferenceEngine`] seam; the only network I/O
//! 4. [`extract`]: isolate the assistant reply and drop unencodable chars
//! 5. [`layout`]: place title, chart and wrapped text on pages, measuring
//!    strings with the Helvetica widths in [`metrics`]
//! 6. [`report`]: serialise the layout to PDF and write it

pub mod encode;
pub mod extract;
pub mod input;
pub mod layout;
pub mod llm;
pub mod metrics;
pub mod report;
