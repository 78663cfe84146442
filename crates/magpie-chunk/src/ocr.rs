//! OCR fallback for scanned PDFs, using poppler and Tesseract.

use crate::error::{ChunkError, ChunkResult};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Rasterization resolution for scanned pages.
const RASTER_DPI: &str = "200";

/// Tesseract language pack selection.
const OCR_LANGUAGES: &str = "eng+deu";

/// Rasterize every page of a PDF and OCR the images.
///
/// Per-page OCR failures are logged and skipped; the remaining pages still
/// produce text. Blocking — run under `spawn_blocking`.
pub(crate) fn ocr_pdf(pdf_bytes: &[u8]) -> ChunkResult<String> {
    for tool in ["pdftoppm", "tesseract"] {
        if which::which(tool).is_err() {
            return Err(ChunkError::ToolNotFound {
                tool: tool.to_string(),
            });
        }
    }

    let dir = tempfile::tempdir()?;
    let pdf_path = dir.path().join("input.pdf");
    std::fs::write(&pdf_path, pdf_bytes)?;

    rasterize(&pdf_path, dir.path())?;

    let mut pages: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "png").unwrap_or(false))
        .collect();
    pages.sort();

    debug!("OCR over {} rasterized pages", pages.len());

    let mut texts = Vec::new();
    for page in &pages {
        match ocr_image(page) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("OCR failed for {:?}: {}", page.file_name(), e);
                continue;
            }
        }
    }

    Ok(texts.join("\n"))
}

fn rasterize(pdf_path: &Path, out_dir: &Path) -> ChunkResult<()> {
    let output = Command::new("pdftoppm")
        .arg("-png")
        .args(["-r", RASTER_DPI])
        .arg(pdf_path)
        .arg(out_dir.join("page"))
        .output()?;

    if !output.status.success() {
        return Err(ChunkError::Pdf(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }
    Ok(())
}

fn ocr_image(image_path: &Path) -> ChunkResult<String> {
    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["-l", OCR_LANGUAGES])
        .output()?;

    if !output.status.success() && output.stdout.is_empty() {
        return Err(ChunkError::Ocr(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
