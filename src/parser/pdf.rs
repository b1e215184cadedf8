//! PDF text extraction through the `pdftotext` utility (poppler-utils)

use super::text::extract_text_links;
use super::ParsedPage;
use tokio::process::Command;

/// Extracts text and embedded URLs from a PDF document
///
/// The bytes are written to a temporary file because `pdftotext` needs a
/// seekable input. Page breaks are suppressed so text flows continuously.
///
/// # Returns
///
/// * `Ok(ParsedPage)` - Text and links found in the document
/// * `Err(String)` - `pdftotext` is missing or rejected the document
pub(super) async fn parse_pdf(body: &[u8]) -> Result<ParsedPage, String> {
    let file = tempfile::Builder::new()
        .prefix("strand-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| format!("cannot create temp file: {}", e))?;

    tokio::fs::write(file.path(), body)
        .await
        .map_err(|e| format!("cannot write temp file: {}", e))?;

    let output = Command::new("pdftotext")
        .arg("-nopgbrk")
        .arg(file.path())
        .arg("-")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("cannot run pdftotext: {}", e))?;

    if !output.status.success() {
        return Err(format!(
            "pdftotext exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(ParsedPage {
        links: extract_text_links(&text),
        text,
        metadata: Default::default(),
    })
}
