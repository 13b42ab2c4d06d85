//! PDF Tools Library
//!
//! Building blocks for three small PDF command-line tools:
//! - Remove text watermarks (given or auto-detected) from every page
//! - Detect a table of contents, link its rows and write an outline
//! - Extract a contiguous page range into a new PDF
//!
//! # Example
//!
//! ```no_run
//! use pdf_tools::pdf::{extract_pages, ExtractOptions};
//! use pdf_tools::PageRange;
//! use std::path::PathBuf;
//!
//! let options = ExtractOptions {
//!     input_path: PathBuf::from("guide.pdf"),
//!     output_path: None,
//!     range: "286,314".parse::<PageRange>().expect("valid range"),
//! };
//!
//! let summary = extract_pages(&options).expect("Failed to extract pages");
//! println!("Wrote {} pages to {}", summary.page_count, summary.output_path.display());
//! ```

pub mod cli;
pub mod error;
pub mod pdf;
pub mod range;
pub mod toc;

// Re-export commonly used items
pub use error::{Error, Result};
pub use range::PageRange;
