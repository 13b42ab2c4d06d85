//! Error types for the PDF tools library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF tools library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input does not carry a .pdf extension
    #[error("Input file must be a PDF: {}", .0.display())]
    NotPdf(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Range argument could not be parsed
    #[error("Invalid page range '{0}'. Use 'start,end' or 'start-end' (e.g. '3,14' or '3-14')")]
    InvalidRange(String),

    /// Range with start after end
    #[error("Start page ({start}) must be <= end page ({end})")]
    InvertedRange { start: u32, end: u32 },

    /// Range outside the document
    #[error("Page range {start}-{end} is out of bounds (PDF has {page_count} pages)")]
    RangeOutOfBounds { start: u32, end: u32, page_count: u32 },

    /// Auto-detection found no recurring text
    #[error("Could not auto-detect a watermark; specify one with --remove-string")]
    WatermarkNotDetected,

    /// Watermark string is empty after normalisation
    #[error("Watermark string must contain non-whitespace characters")]
    EmptyWatermark,

    /// No table of contents entries could be extracted
    #[error("Could not extract table of contents entries; the PDF may not have a table of contents, or it is in an unsupported format")]
    TocNotFound,

    /// General error
    #[error("{0}")]
    General(String),
}
