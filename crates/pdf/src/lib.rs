//! PDF text extraction for dcbounds.
//!
//! Produces pages of [`PositionedToken`]s from raw PDF bytes, in the same
//! coordinate space as `pdf2json` dumps, so both sources feed the same
//! parsing pipeline in `dcbounds_core`.

use dcbounds_core::PositionedToken;
use thiserror::Error;

use parser::backend::LopdfBackend;

pub mod cmap;
pub mod parser;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract positioned tokens from every page of a PDF.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<Vec<PositionedToken>>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    log::debug!("loaded PDF with {} pages", backend.page_count());
    parser::extract_document_tokens(&backend)
}

/// Read a PDF from disk and extract its tokens.
pub fn extract_pages_from_path(
    path: impl AsRef<std::path::Path>,
) -> Result<Vec<Vec<PositionedToken>>, PdfError> {
    let bytes = std::fs::read(path)?;
    extract_pages(&bytes)
}
