//! Input resolution: decode an uploaded chart and stage it on disk.
//!
//! Charts arrive either as raw upload bytes (web form) or as a local path
//! (CLI). Both end as a `DynamicImage`. For the duration of a request the
//! chart is also staged as a uniquely named PNG inside the report directory;
//! the returned [`StagedImage`] deletes it when dropped, on success, error or
//! panic alike.

use crate::error::ChartInsightError;
use crate::pipeline::encode::encode_png;
use image::DynamicImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Filename prefix of staged uploads.
pub const STAGED_PREFIX: &str = "chart-upload-";

/// A chart written to a temporary PNG. The file is removed on drop.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    /// Path of the staged PNG.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Decode upload bytes into an image.
///
/// Empty uploads, unsupported formats and zero-pixel images are rejected as
/// [`ChartInsightError::InvalidInput`].
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ChartInsightError> {
    if bytes.is_empty() {
        return Err(ChartInsightError::invalid_input("no image supplied"));
    }
    let img = image::load_from_memory(bytes).map_err(|e| {
        ChartInsightError::invalid_input(format!("upload is not a supported image: {e}"))
    })?;
    ensure_has_pixels(&img)?;
    debug!("Decoded chart: {}x{} px", img.width(), img.height());
    Ok(img)
}

/// Load a chart from a local file.
pub fn load_image(path: &Path) -> Result<DynamicImage, ChartInsightError> {
    if !path.exists() {
        return Err(ChartInsightError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ChartInsightError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ChartInsightError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode_image(&bytes)
}

/// Reject images without pixels; nothing downstream can scale or encode them.
pub fn ensure_has_pixels(img: &DynamicImage) -> Result<(), ChartInsightError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ChartInsightError::invalid_input(format!(
            "image has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }
    Ok(())
}

/// Write `img` as a uniquely named PNG inside `dir`.
pub fn stage_image(img: &DynamicImage, dir: &Path) -> Result<StagedImage, ChartInsightError> {
    let io_err = |source: std::io::Error| ChartInsightError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let png = encode_png(img).map_err(|e| {
        ChartInsightError::Report(crate::error::ReportError::ImageEncoding(e))
    })?;

    let mut file = tempfile::Builder::new()
        .prefix(STAGED_PREFIX)
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(io_err)?;
    file.write_all(&png).map_err(|source| ChartInsightError::Io {
        path: file.path().to_path_buf(),
        source,
    })?;
    file.flush().map_err(|source| ChartInsightError::Io {
        path: file.path().to_path_buf(),
        source,
    })?;

    debug!("Staged chart at {} ({} bytes)", file.path().display(), png.len());
    Ok(StagedImage { file })
}

/// Staged files currently present in `dir` (used by cleanup checks).
pub fn staged_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_staged = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(STAGED_PREFIX));
        if is_staged {
            found.push(path);
        }
    }
    Ok(found)
}
