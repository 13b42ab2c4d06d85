//! PDF manipulation module

pub mod document;
pub mod geometry;
pub mod fonts;
pub mod text;
pub mod extract;
pub mod watermark;
pub mod bookmarks;

// Re-export commonly used items
pub use document::{count_pages, open_pdf, save_pdf};
pub use extract::{extract_pages, extract_range, ExtractOptions, ExtractSummary};
pub use watermark::{detect_watermark, remove_watermarks, RemovalReport, RemovalStats, WatermarkOptions};
pub use bookmarks::{add_bookmarks, collect_toc, BookmarkOptions, BookmarkReport, OutlineStyle};
