//! Table-of-contents links and document outline
//!
//! Finds the table of contents, turns each row into a link annotation that
//! jumps to the page it names, and replaces the document outline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use lopdf::{dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};
use crate::range::PageRange;
use crate::toc::{detect_toc_start, parse_toc_lines, toc_like_line_count, SkippedLine, TocEntry, TOC_SEARCH_PAGES};
use super::document::{catalog_id, open_pdf, save_pdf, sibling_path, text_string};
use super::text::{lines_to_text, page_lines, page_text};

/// Pages scanned after the detected TOC start
pub const MAX_TOC_PAGES: usize = 10;

/// Padding around a TOC row's link rectangle, in points
const LINK_PADDING: f32 = 1.0;

/// Shape of the outline written to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutlineStyle {
    /// One entry per page, named after the first TOC title pointing at it
    #[default]
    Pages,
    /// The table of contents itself, nested by section number
    Toc,
}

/// Options for adding bookmarks
#[derive(Debug, Clone)]
pub struct BookmarkOptions {
    /// Input PDF file
    pub input_path: PathBuf,
    /// Output PDF file; defaults to `<input-dir>/<stem>_linked.pdf`
    pub output_path: Option<PathBuf>,
    /// Pages holding the table of contents; auto-detected when `None`
    pub index_range: Option<PageRange>,
    /// Added to printed page numbers to get physical pages
    pub page_offset: i32,
    pub outline: OutlineStyle,
    /// Add link annotations on the TOC rows
    pub add_links: bool,
}

impl Default for BookmarkOptions {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: None,
            index_range: None,
            page_offset: 0,
            outline: OutlineStyle::Pages,
            add_links: true,
        }
    }
}

/// Everything found while scanning for a table of contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TocScan {
    pub entries: Vec<TocEntry>,
    pub skipped: Vec<SkippedLine>,
    /// Pages (1-indexed) that contributed entries
    pub toc_pages: Vec<u32>,
}

/// A bookmark to write
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineItem {
    pub title: String,
    /// Target page (1-indexed)
    pub page: u32,
    /// Nesting depth, 1 for top level
    pub level: u32,
}

/// Link annotation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub added: usize,
    /// Entries whose target page is outside the document
    pub out_of_range: usize,
}

/// Outcome of [`add_bookmarks`]
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkReport {
    pub output_path: PathBuf,
    pub entries: usize,
    pub skipped_lines: usize,
    pub links: LinkStats,
    pub outline_items: usize,
    pub toc_pages: Vec<u32>,
}

/// Default output path: `<input-dir>/<stem>_linked.pdf`
pub fn default_output_path(input: &Path) -> PathBuf {
    sibling_path(input, "_linked")
}

/// Physical page for a printed page number, if it exists
pub fn target_page(printed_page: u32, page_offset: i32, page_count: u32) -> Option<u32> {
    let target = i64::from(printed_page) + i64::from(page_offset);
    if target >= 1 && target <= i64::from(page_count) {
        Some(target as u32)
    } else {
        None
    }
}

fn scan_page(doc: &Document, page_number: u32, page_id: ObjectId, scan: &mut TocScan) {
    let lines = page_lines(doc, page_id);
    let page = parse_toc_lines(&lines, page_number);
    if !page.entries.is_empty() {
        log::info!("Found {} TOC entries on page {}", page.entries.len(), page_number);
        scan.toc_pages.push(page_number);
    }
    scan.entries.extend(page.entries);
    scan.skipped.extend(page.skipped);
}

/// Collect table-of-contents entries
///
/// With an index range every page in it is parsed. Otherwise the start page
/// is detected among the first pages (page 1 if nothing scores high enough)
/// and up to [`MAX_TOC_PAGES`] pages are read until one stops looking like a
/// table of contents.
pub fn collect_toc(doc: &Document, index_range: Option<&PageRange>) -> Result<TocScan> {
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
    let page_count = pages.len() as u32;
    let mut scan = TocScan::default();

    if let Some(range) = index_range {
        range.validate(page_count)?;
        log::info!("Processing table of contents from pages {} to {}", range.start, range.end);
        for page_number in range.pages() {
            if let Some(&page_id) = pages.get(&page_number) {
                scan_page(doc, page_number, page_id, &mut scan);
            }
        }
    } else {
        let page_texts: Vec<String> = pages
            .values()
            .take(TOC_SEARCH_PAGES)
            .map(|&id| page_text(doc, id))
            .collect();
        let start = match detect_toc_start(&page_texts) {
            Some(index) => index as u32 + 1,
            None => {
                log::warn!("Could not detect a table of contents page; starting at page 1");
                1
            }
        };
        log::info!("Processing table of contents starting from page {}", start);

        for (offset, page_number) in (start..=page_count).take(MAX_TOC_PAGES).enumerate() {
            let Some(&page_id) = pages.get(&page_number) else {
                break;
            };
            let lines = page_lines(doc, page_id);
            if offset > 0 && toc_like_line_count(&lines_to_text(&lines)) < 2 {
                break;
            }

            let page = parse_toc_lines(&lines, page_number);
            scan.skipped.extend(page.skipped);
            if page.entries.is_empty() {
                if offset == 0 {
                    continue;
                }
                break;
            }
            log::info!("Found {} TOC entries on page {}", page.entries.len(), page_number);
            scan.toc_pages.push(page_number);
            scan.entries.extend(page.entries);
        }
    }

    if scan.entries.is_empty() {
        return Err(Error::TocNotFound);
    }
    Ok(scan)
}

fn destination(page_id: ObjectId) -> Object {
    Object::Array(vec![
        Object::Reference(page_id),
        Object::Name(b"XYZ".to_vec()),
        Object::Null,
        Object::Null,
        Object::Null,
    ])
}

/// Append an annotation reference to a page's `/Annots`
fn push_annotation(doc: &mut Document, page_id: ObjectId, annot_id: ObjectId) -> Result<()> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Annots") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };

    // Shared or indirect annotation arrays are copied into the page
    let mut annots = match existing {
        Some(id) => doc.get_object(id).and_then(Object::as_array).cloned().unwrap_or_default(),
        None => match doc.get_dictionary(page_id)?.get(b"Annots") {
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
    };
    annots.push(Object::Reference(annot_id));

    if let Ok(Object::Dictionary(ref mut page)) = doc.get_object_mut(page_id) {
        page.set("Annots", Object::Array(annots));
    }
    Ok(())
}

/// Add one link annotation per entry whose target page exists
///
/// The link covers the TOC row (padded by 1pt) and points at the target
/// page with an `/XYZ` destination that keeps the current zoom.
pub fn add_toc_links(doc: &mut Document, entries: &[TocEntry], page_offset: i32) -> Result<LinkStats> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let mut stats = LinkStats::default();

    for entry in entries {
        let Some(target) = target_page(entry.printed_page, page_offset, page_count) else {
            log::warn!(
                "Skipping link for '{}': page {} is outside the document ({} pages)",
                entry.display_title(),
                entry.printed_page,
                page_count
            );
            stats.out_of_range += 1;
            continue;
        };
        let (Some(&source_id), Some(&target_id)) = (pages.get(&entry.source_page), pages.get(&target)) else {
            continue;
        };

        let rect = entry.rect.pad(LINK_PADDING);
        let annot_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => Object::Array(vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.x1),
                Object::Real(rect.y1),
            ]),
            "Border" => Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
            "Dest" => destination(target_id),
        });
        push_annotation(doc, source_id, annot_id)?;
        stats.added += 1;
    }

    Ok(stats)
}

/// One outline item per page, titled `Page N` or `Page N: <TOC title>`
pub fn page_outline(page_count: u32, entries: &[TocEntry], page_offset: i32) -> Vec<OutlineItem> {
    let mut titles: BTreeMap<u32, String> = BTreeMap::new();
    for entry in entries {
        if let Some(target) = target_page(entry.printed_page, page_offset, page_count) {
            titles.entry(target).or_insert_with(|| entry.display_title());
        }
    }

    (1..=page_count)
        .map(|page| OutlineItem {
            title: match titles.get(&page) {
                Some(title) => format!("Page {}: {}", page, title),
                None => format!("Page {}", page),
            },
            page,
            level: 1,
        })
        .collect()
}

/// Hierarchical outline built from the table of contents
///
/// Entries are ordered by target page, then section number. Titles shorter
/// than three characters and bare numbers are left out. The first item is
/// always top level: the first level-1 item is moved to the front, or the
/// first item is promoted when there is none.
pub fn toc_outline(entries: &[TocEntry], page_offset: i32, page_count: u32) -> Vec<OutlineItem> {
    let mut usable: Vec<(u32, &TocEntry)> = entries
        .iter()
        .filter(|e| e.title.chars().count() >= 3)
        .filter(|e| !e.title.chars().all(|c| c.is_ascii_digit() || c == '.' || c.is_whitespace()))
        .filter_map(|e| target_page(e.printed_page, page_offset, page_count).map(|page| (page, e)))
        .collect();
    usable.sort_by(|(page_a, a), (page_b, b)| page_a.cmp(page_b).then_with(|| a.section_key().cmp(&b.section_key())));

    let mut items: Vec<OutlineItem> = usable
        .into_iter()
        .map(|(page, entry)| OutlineItem {
            title: entry.display_title(),
            page,
            level: entry.level.max(1),
        })
        .collect();

    if items.first().is_some_and(|first| first.level != 1) {
        match items.iter().position(|item| item.level == 1) {
            Some(index) => {
                log::warn!("First bookmark is not top level; moving '{}' to the front", items[index].title);
                let item = items.remove(index);
                items.insert(0, item);
            }
            None => {
                log::warn!("No top-level bookmark found; promoting '{}' to level 1", items[0].title);
                items[0].level = 1;
            }
        }
    }
    items
}

/// Replace the document outline with `items`
///
/// Levels nest: an item becomes a child of the closest preceding item with a
/// lower level. Sets `/PageMode /UseOutlines` and prunes the old outline.
pub fn write_outline(doc: &mut Document, items: &[OutlineItem]) -> Result<usize> {
    let pages = doc.get_pages();
    let items: Vec<&OutlineItem> = items.iter().filter(|item| pages.contains_key(&item.page)).collect();
    let root_id = catalog_id(doc)?;

    if items.is_empty() {
        if let Ok(Object::Dictionary(ref mut catalog)) = doc.get_object_mut(root_id) {
            catalog.remove(b"Outlines");
        }
        doc.prune_objects();
        return Ok(0);
    }

    let outlines_id = doc.new_object_id();
    let ids: Vec<ObjectId> = items.iter().map(|_| doc.new_object_id()).collect();

    // parent index per item (None = outline root) and children per node
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(items.len());
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut top_level: Vec<usize> = Vec::new();
    let mut stack: Vec<(u32, usize)> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        while stack.last().is_some_and(|(level, _)| *level >= item.level) {
            stack.pop();
        }
        let parent = stack.last().map(|(_, parent)| *parent);
        match parent {
            Some(p) => children[p].push(index),
            None => top_level.push(index),
        }
        parents.push(parent);
        stack.push((item.level, index));
    }

    fn descendants(node: usize, children: &[Vec<usize>]) -> usize {
        children[node].iter().map(|&child| 1 + descendants(child, children)).sum()
    }

    for (index, item) in items.iter().enumerate() {
        let page_id = pages[&item.page];
        let mut dict = dictionary! {
            "Title" => text_string(&item.title),
            "Parent" => Object::Reference(parents[index].map(|p| ids[p]).unwrap_or(outlines_id)),
            "Dest" => destination(page_id),
        };

        let siblings = match parents[index] {
            Some(p) => &children[p],
            None => &top_level,
        };
        if let Some(pos) = siblings.iter().position(|&s| s == index) {
            if pos > 0 {
                dict.set("Prev", Object::Reference(ids[siblings[pos - 1]]));
            }
            if let Some(&next) = siblings.get(pos + 1) {
                dict.set("Next", Object::Reference(ids[next]));
            }
        }

        if let (Some(&first), Some(&last)) = (children[index].first(), children[index].last()) {
            dict.set("First", Object::Reference(ids[first]));
            dict.set("Last", Object::Reference(ids[last]));
            dict.set("Count", Object::Integer(descendants(index, &children) as i64));
        }

        doc.objects.insert(ids[index], Object::Dictionary(dict));
    }

    let mut root = dictionary! {
        "Type" => "Outlines",
        "Count" => Object::Integer(items.len() as i64),
    };
    if let (Some(&first), Some(&last)) = (top_level.first(), top_level.last()) {
        root.set("First", Object::Reference(ids[first]));
        root.set("Last", Object::Reference(ids[last]));
    }
    doc.objects.insert(outlines_id, Object::Dictionary(root));

    if let Ok(Object::Dictionary(ref mut catalog)) = doc.get_object_mut(root_id) {
        catalog.set("Outlines", Object::Reference(outlines_id));
        catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
    }

    doc.prune_objects();
    Ok(items.len())
}

/// Detect the table of contents, link it and write the outline
///
/// Fails with [`Error::TocNotFound`] before anything is written if no entry
/// can be extracted.
pub fn add_bookmarks(options: &BookmarkOptions) -> Result<BookmarkReport> {
    let mut doc = open_pdf(&options.input_path)?;
    let page_count = doc.get_pages().len() as u32;
    log::info!("PDF has {} pages", page_count);

    let scan = collect_toc(&doc, options.index_range.as_ref())?;
    log::info!("Found {} TOC entries", scan.entries.len());
    if !scan.skipped.is_empty() {
        log::warn!("Skipped {} TOC line(s) with unusable page numbers", scan.skipped.len());
    }

    let links = if options.add_links {
        let links = add_toc_links(&mut doc, &scan.entries, options.page_offset)?;
        log::info!("Added {} hyperlinks", links.added);
        links
    } else {
        LinkStats::default()
    };

    let items = match options.outline {
        OutlineStyle::Pages => page_outline(page_count, &scan.entries, options.page_offset),
        OutlineStyle::Toc => toc_outline(&scan.entries, options.page_offset, page_count),
    };
    let outline_items = write_outline(&mut doc, &items)?;
    log::info!("Added {} bookmarks", outline_items);

    let output_path = options
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(&options.input_path));
    save_pdf(&mut doc, &output_path)?;

    Ok(BookmarkReport {
        output_path,
        entries: scan.entries.len(),
        skipped_lines: scan.skipped.len(),
        links,
        outline_items,
        toc_pages: scan.toc_pages,
    })
}
