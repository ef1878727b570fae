//! Text Extractor — plain text plus a best-effort title guess from a resume PDF.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::info;

pub const UNSPECIFIED_TITLE: &str = "Unspecified Position";

/// Lines scanned for a title guess.
const TITLE_SCAN_LINES: usize = 10;

lazy_static! {
    static ref TITLE_RE: Regex = Regex::new(
        r"(?i)(?:senior|junior|lead)?\s*(?:software|frontend|backend|fullstack|web)\s*(?:developer|engineer|architect)"
    )
    .unwrap();
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("empty document")]
    Empty,

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("extraction task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub text: String,
    pub title_guess: Option<String>,
}

/// Extracts text from PDF bytes on a blocking thread.
pub async fn extract_document(bytes: bytes::Bytes) -> Result<ExtractedDocument, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    info!("Extracted {} characters from PDF", text.len());
    let title_guess = guess_title(&text);
    Ok(ExtractedDocument { text, title_guess })
}

/// Looks for a common engineering title in the first lines of a resume.
pub fn guess_title(text: &str) -> Option<String> {
    let head = text
        .lines()
        .take(TITLE_SCAN_LINES)
        .collect::<Vec<_>>()
        .join(" ");
    TITLE_RE
        .find(&head)
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Text stored on the candidate when extraction fails.
pub fn extraction_failure_text(error: &ExtractError) -> String {
    format!("Error processing PDF file: {error}. Please check server logs for details.")
}
