//! Page range extraction

use std::path::{Path, PathBuf};
use lopdf::{Document, Object};
use crate::error::Result;
use crate::range::PageRange;
use super::document::{catalog_id, open_pdf, save_pdf, sibling_path};

/// Options for extracting a page range
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Input PDF file
    pub input_path: PathBuf,
    /// Output PDF file; defaults to `<input-dir>/<stem>_<start>-<end>.pdf`
    pub output_path: Option<PathBuf>,
    /// Pages to keep (1-indexed, inclusive)
    pub range: PageRange,
}

/// Result of a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSummary {
    pub output_path: PathBuf,
    pub page_count: u32,
}

/// Default output path: `<input-dir>/<stem>_<start>-<end>.pdf`
pub fn default_output_path(input: &Path, range: &PageRange) -> PathBuf {
    sibling_path(input, &format!("_{}", range))
}

/// Keep only the pages in `range`, in order
///
/// Pages outside the range are removed from the page tree, the document
/// outline is dropped (its destinations would dangle) and unreferenced
/// objects are pruned.
pub fn extract_range(doc: &mut Document, range: &PageRange) -> Result<()> {
    let total = doc.get_pages().len() as u32;
    range.validate(total)?;

    let to_delete: Vec<u32> = (1..=total).filter(|p| !range.contains(*p)).collect();
    if !to_delete.is_empty() {
        doc.delete_pages(&to_delete);
    }

    let root_id = catalog_id(doc)?;
    if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(root_id) {
        catalog.remove(b"Outlines");
        let uses_outlines = catalog
            .get(b"PageMode")
            .and_then(|m| m.as_name())
            .map(|m| m == b"UseOutlines")
            .unwrap_or(false);
        if uses_outlines {
            catalog.remove(b"PageMode");
        }
    }

    let pruned = doc.prune_objects();
    log::debug!("Pruned {} unreferenced objects", pruned.len());
    Ok(())
}

/// Extract a page range into a new PDF
///
/// Nothing is written if the range does not fit the document.
pub fn extract_pages(options: &ExtractOptions) -> Result<ExtractSummary> {
    let mut doc = open_pdf(&options.input_path)?;
    let total = doc.get_pages().len() as u32;
    options.range.validate(total)?;

    let output_path = options
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(&options.input_path, &options.range));

    log::info!(
        "Extracting pages {} to {} of {} from {}",
        options.range.start,
        options.range.end,
        total,
        options.input_path.display()
    );

    extract_range(&mut doc, &options.range)?;
    let kept = doc.get_pages().len() as u32;
    save_pdf(&mut doc, &output_path)?;

    Ok(ExtractSummary {
        output_path,
        page_count: kept,
    })
}
