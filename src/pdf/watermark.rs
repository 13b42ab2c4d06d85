//! Watermark detection and removal
//!
//! Watermarks are recurring text fragments. Removal works on the decoded
//! content streams of every page and every Form XObject a page draws:
//! a text-showing operator whose own text matches is replaced by an
//! invisible one with the same advance, and a text object whose combined
//! text matches loses all of its text. Matching ignores case and whitespace.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};
use super::document::{
    as_number, decode_text_string, open_pdf, page_content, page_resources, resolve, resolved_dict,
    save_pdf, set_page_content, stream_bytes,
};
use super::fonts::{load_fonts, FontInfo, FontMap, TextMetrics};
use super::text::{group_lines, is_form_xobject, page_fonts, page_spans, page_text, text_blocks, MAX_FORM_DEPTH};

/// Pages sampled by auto-detection unless told otherwise
pub const DEFAULT_SAMPLE_PAGES: usize = 3;

/// Auto-detection needs at least this many pages to compare
const MIN_SAMPLED_PAGES: usize = 2;

/// Share of sampled pages a candidate must appear on
const DETECTION_THRESHOLD: f32 = 0.7;

const MIN_CANDIDATE_CHARS: usize = 4;
const MAX_CANDIDATE_CHARS: usize = 120;

/// Options for removing watermarks
#[derive(Debug, Clone)]
pub struct WatermarkOptions {
    /// Input PDF file
    pub input_path: PathBuf,
    /// Output PDF file; defaults to `<cwd>/<stem>_remove_watermark.pdf`
    pub output_path: Option<PathBuf>,
    /// Strings to remove; auto-detect when empty
    pub remove_strings: Vec<String>,
    /// Pages sampled by auto-detection
    pub sample_pages: usize,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: None,
            remove_strings: Vec::new(),
            sample_pages: DEFAULT_SAMPLE_PAGES,
        }
    }
}

/// What a removal pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalStats {
    pub pages_modified: usize,
    pub text_ops_removed: usize,
    pub text_blocks_removed: usize,
    pub annotations_removed: usize,
    pub xobjects_modified: usize,
}

impl RemovalStats {
    pub fn removed_anything(&self) -> bool {
        self.text_ops_removed + self.text_blocks_removed + self.annotations_removed > 0
    }
}

/// Outcome of [`remove_watermarks`]
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalReport {
    /// Strings that were removed (given or detected)
    pub watermarks: Vec<String>,
    pub output_path: PathBuf,
    pub stats: RemovalStats,
    /// Pages (1-indexed) whose text still contains a watermark
    pub remaining_pages: Vec<u32>,
}

/// Lowercase and drop all whitespace
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case- and whitespace-insensitive substring matcher
#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<String>,
}

impl Matcher {
    /// Fails with [`Error::EmptyWatermark`] if a pattern has no visible characters
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = patterns.iter().map(|p| normalize(p.as_ref())).collect();
        if patterns.iter().any(String::is_empty) {
            return Err(Error::EmptyWatermark);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = normalize(text);
        !text.is_empty() && self.patterns.iter().any(|p| text.contains(p.as_str()))
    }
}

/// Default output path: `<cwd>/<stem>_remove_watermark.pdf`
pub fn default_output_path(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    Ok(std::env::current_dir()?.join(format!("{}_remove_watermark.pdf", stem)))
}

/// Find a text fragment repeated on most of the first `sample_pages` pages
///
/// Candidates are the text of each text object and each layout line, 4 to
/// 120 characters long, counted once per page. The most frequent one wins
/// if it appears on at least 70% of the sampled pages; ties go to the one
/// seen first.
pub fn detect_watermark(doc: &Document, sample_pages: usize) -> Option<String> {
    let sampled: Vec<ObjectId> = doc
        .get_pages()
        .values()
        .take(sample_pages.max(MIN_SAMPLED_PAGES))
        .copied()
        .collect();
    if sampled.len() < MIN_SAMPLED_PAGES {
        log::debug!("Not enough pages to detect a watermark");
        return None;
    }

    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for page_id in &sampled {
        let spans = page_spans(doc, *page_id);
        let lines = group_lines(&spans).into_iter().map(|line| line.text.replace('\t', " "));
        let mut seen: HashSet<String> = HashSet::new();

        for candidate in text_blocks(&spans).into_iter().chain(lines) {
            let candidate = candidate.trim().to_string();
            let len = candidate.chars().count();
            if !(MIN_CANDIDATE_CHARS..=MAX_CANDIDATE_CHARS).contains(&len) || !seen.insert(candidate.clone()) {
                continue;
            }
            match index.get(&candidate) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(candidate.clone(), counts.len());
                    counts.push((candidate, 1));
                }
            }
        }
    }

    let mut best: Option<&(String, usize)> = None;
    for entry in &counts {
        if best.map_or(true, |b| entry.1 > b.1) {
            best = Some(entry);
        }
    }

    let threshold = DETECTION_THRESHOLD * sampled.len() as f32;
    best.filter(|(_, count)| *count as f32 >= threshold)
        .map(|(text, _)| text.clone())
}

#[derive(Debug, Clone, Copy, Default)]
struct ContentChanges {
    ops_removed: usize,
    blocks_removed: usize,
}

impl ContentChanges {
    fn any(&self) -> bool {
        self.ops_removed + self.blocks_removed > 0
    }
}

/// The part of the text state that decides what a show operator draws
#[derive(Debug, Clone, Default)]
struct ShowState {
    font: Option<Vec<u8>>,
    metrics: TextMetrics,
}

impl ShowState {
    fn apply(&mut self, op: &Operation) {
        let number = |i: usize| op.operands.get(i).and_then(as_number).unwrap_or(0.0);
        match op.operator.as_str() {
            "Tf" => {
                self.font = op.operands.first().and_then(|o| o.as_name().ok()).map(|n| n.to_vec());
                self.metrics.font_size = number(1);
            }
            "Tc" => self.metrics.char_spacing = number(0),
            "Tw" => self.metrics.word_spacing = number(0),
            "Tz" => self.metrics.h_scale = number(0) / 100.0,
            "\"" => {
                self.metrics.word_spacing = number(0);
                self.metrics.char_spacing = number(1);
            }
            _ => {}
        }
    }

    fn font<'f>(&self, fonts: &'f FontMap, fallback: &'f FontInfo) -> &'f FontInfo {
        self.font.as_ref().and_then(|name| fonts.get(name)).unwrap_or(fallback)
    }
}

fn is_show(op: &Operation) -> bool {
    matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"")
}

fn shown_strings(op: &Operation) -> Vec<&[u8]> {
    match op.operator.as_str() {
        "TJ" => op
            .operands
            .first()
            .and_then(|o| o.as_array().ok())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Object::String(bytes, _) => Some(bytes.as_slice()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => match op.operands.last() {
            Some(Object::String(bytes, _)) => vec![bytes.as_slice()],
            _ => Vec::new(),
        },
    }
}

fn shown_text(op: &Operation, font: &FontInfo) -> String {
    shown_strings(op).into_iter().map(|bytes| font.decode(bytes)).collect()
}

/// Horizontal displacement of a show operator in unscaled text space
fn show_advance(op: &Operation, state: &ShowState, font: &FontInfo) -> f32 {
    let metrics = &state.metrics;
    if op.operator == "TJ" {
        let items = op.operands.first().and_then(|o| o.as_array().ok());
        return items
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Object::String(bytes, _) => font.advance(bytes, metrics),
                        other => as_number(other)
                            .map(|n| -n / 1000.0 * metrics.font_size * metrics.h_scale)
                            .unwrap_or(0.0),
                    })
                    .sum()
            })
            .unwrap_or(0.0);
    }
    shown_strings(op).into_iter().map(|bytes| font.advance(bytes, metrics)).sum()
}

/// Replace a show operator by one that draws nothing but moves the same distance
fn blank_show(op: &Operation, state: &ShowState, font: &FontInfo) -> Vec<Operation> {
    let mut ops = Vec::new();
    match op.operator.as_str() {
        "'" => ops.push(Operation::new("T*", vec![])),
        "\"" => {
            let operand = |i: usize| op.operands.get(i).cloned().unwrap_or(Object::Integer(0));
            ops.push(Operation::new("Tw", vec![operand(0)]));
            ops.push(Operation::new("Tc", vec![operand(1)]));
            ops.push(Operation::new("T*", vec![]));
        }
        _ => {}
    }

    let advance = show_advance(op, state, font);
    let scale = state.metrics.font_size * state.metrics.h_scale;
    let items = if scale.abs() > f32::EPSILON && advance.abs() > f32::EPSILON {
        vec![Object::Real(-advance * 1000.0 / scale)]
    } else {
        Vec::new()
    };
    ops.push(Operation::new("TJ", vec![Object::Array(items)]));
    ops
}

/// Filter one BT..ET object, updating `state` to what it is after ET
fn filter_block(
    ops: Vec<Operation>,
    state: &mut ShowState,
    fonts: &FontMap,
    matcher: &Matcher,
    changes: &mut ContentChanges,
) -> Vec<Operation> {
    let fallback = FontInfo::default();
    let mut running = state.clone();
    let mut shown: Vec<Option<(String, ShowState)>> = Vec::with_capacity(ops.len());
    for op in &ops {
        running.apply(op);
        shown.push(if is_show(op) {
            Some((shown_text(op, running.font(fonts, &fallback)), running.clone()))
        } else {
            None
        });
    }
    *state = running;

    let single_match = shown.iter().flatten().any(|(text, _)| matcher.matches(text));
    if single_match {
        let mut result = Vec::with_capacity(ops.len());
        for (op, info) in ops.into_iter().zip(shown) {
            match info {
                Some((text, op_state)) if matcher.matches(&text) => {
                    changes.ops_removed += 1;
                    result.extend(blank_show(&op, &op_state, op_state.font(fonts, &fallback)));
                }
                _ => result.push(op),
            }
        }
        return result;
    }

    let combined: String = shown.iter().flatten().map(|(text, _)| text.as_str()).collect();
    if !matcher.matches(&combined) {
        return ops;
    }

    changes.blocks_removed += 1;
    let mut result = Vec::with_capacity(ops.len());
    for op in ops {
        if !is_show(&op) {
            result.push(op);
        } else if op.operator == "\"" {
            // Tw and Tc set by " outlive the text object
            result.push(Operation::new("Tw", vec![op.operands.first().cloned().unwrap_or(Object::Integer(0))]));
            result.push(Operation::new("Tc", vec![op.operands.get(1).cloned().unwrap_or(Object::Integer(0))]));
        }
    }
    result
}

/// Remove matching text from a decoded content stream
fn filter_operations(ops: Vec<Operation>, fonts: &FontMap, matcher: &Matcher) -> (Vec<Operation>, ContentChanges) {
    let mut out = Vec::with_capacity(ops.len());
    let mut changes = ContentChanges::default();
    let mut state = ShowState::default();
    let mut stack: Vec<ShowState> = Vec::new();
    let mut block: Option<Vec<Operation>> = None;

    for op in ops {
        if let Some(pending) = block.as_mut() {
            let ends = op.operator == "ET";
            pending.push(op);
            if ends {
                let pending = block.take().unwrap_or_default();
                out.extend(filter_block(pending, &mut state, fonts, matcher, &mut changes));
            }
            continue;
        }

        if op.operator == "BT" {
            block = Some(vec![op]);
            continue;
        }

        match op.operator.as_str() {
            "q" => stack.push(state.clone()),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            _ => state.apply(&op),
        }
        out.push(op);
    }

    // Unterminated text object
    if let Some(pending) = block {
        out.extend(pending);
    }

    (out, changes)
}

struct FormTarget {
    id: ObjectId,
    fonts: FontMap,
}

/// Form XObjects reachable from a resource dictionary, skipping ones already seen
fn collect_forms(
    doc: &Document,
    resources: Option<&Dictionary>,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<FormTarget>,
) {
    if depth >= MAX_FORM_DEPTH {
        return;
    }
    let Some(xobjects) = resources.and_then(|r| resolved_dict(doc, r, b"XObject")) else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            continue;
        };
        if !is_form_xobject(stream) || !seen.insert(id) {
            continue;
        }
        let form_resources = resolved_dict(doc, &stream.dict, b"Resources").or(resources);
        out.push(FormTarget {
            id,
            fonts: load_fonts(doc, form_resources),
        });
        collect_forms(doc, form_resources, depth + 1, seen, out);
    }
}

fn rewrite_form(doc: &mut Document, target: &FormTarget, matcher: &Matcher) -> Result<ContentChanges> {
    let bytes = match doc.get_object(target.id) {
        Ok(Object::Stream(stream)) => stream_bytes(stream),
        _ => None,
    };
    let Some(bytes) = bytes else {
        log::debug!("Skipping undecodable form XObject {:?}", target.id);
        return Ok(ContentChanges::default());
    };

    let operations = match Content::decode(&bytes) {
        Ok(content) => content.operations,
        Err(e) => {
            log::warn!("Could not parse form XObject {:?}: {}", target.id, e);
            return Ok(ContentChanges::default());
        }
    };

    let (operations, changes) = filter_operations(operations, &target.fonts, matcher);
    if changes.any() {
        let encoded = Content { operations }.encode()?;
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(target.id) {
            stream.dict.remove(b"Filter");
            stream.dict.remove(b"DecodeParms");
            stream.set_content(encoded);
        }
    }
    Ok(changes)
}

fn annotation_matches(annot: &Dictionary, matcher: &Matcher) -> bool {
    [b"Contents".as_slice(), b"T".as_slice()].iter().any(|key| match annot.get(key) {
        Ok(Object::String(bytes, _)) => matcher.matches(&decode_text_string(bytes)),
        _ => false,
    })
}

/// Drop annotations whose `/Contents` or `/T` contains a watermark
fn remove_matching_annotations(doc: &mut Document, page_id: ObjectId, matcher: &Matcher) -> Result<usize> {
    let annots: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Annots") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_array).cloned().unwrap_or_default(),
            _ => return Ok(0),
        }
    };

    let mut kept = Vec::with_capacity(annots.len());
    let mut removed = 0;
    for annot in annots {
        let matched = match resolve(doc, &annot) {
            Object::Dictionary(dict) => annotation_matches(dict, matcher),
            _ => false,
        };
        if matched {
            removed += 1;
        } else {
            kept.push(annot);
        }
    }

    if removed > 0 {
        if let Ok(Object::Dictionary(ref mut page)) = doc.get_object_mut(page_id) {
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", Object::Array(kept));
            }
        }
    }
    Ok(removed)
}

/// Remove every occurrence of `patterns` from a document in memory
pub fn remove_watermarks_in<S: AsRef<str>>(doc: &mut Document, patterns: &[S]) -> Result<RemovalStats> {
    let matcher = Matcher::new(patterns)?;
    let mut stats = RemovalStats::default();
    let mut seen_forms: HashSet<ObjectId> = HashSet::new();

    for (page_number, page_id) in doc.get_pages() {
        let mut page_changed = false;

        let content = page_content(doc, page_id);
        if !content.is_empty() {
            match Content::decode(&content) {
                Ok(decoded) => {
                    let fonts = page_fonts(doc, page_id);
                    let (operations, changes) = filter_operations(decoded.operations, &fonts, &matcher);
                    if changes.any() {
                        let encoded = Content { operations }.encode()?;
                        set_page_content(doc, page_id, encoded)?;
                        stats.text_ops_removed += changes.ops_removed;
                        stats.text_blocks_removed += changes.blocks_removed;
                        page_changed = true;
                    }
                }
                Err(e) => log::warn!("Could not parse content of page {}: {}", page_number, e),
            }
        }

        let mut forms = Vec::new();
        collect_forms(doc, page_resources(doc, page_id), 0, &mut seen_forms, &mut forms);
        for form in &forms {
            let changes = rewrite_form(doc, form, &matcher)?;
            if changes.any() {
                stats.text_ops_removed += changes.ops_removed;
                stats.text_blocks_removed += changes.blocks_removed;
                stats.xobjects_modified += 1;
                page_changed = true;
            }
        }

        let removed = remove_matching_annotations(doc, page_id, &matcher)?;
        if removed > 0 {
            stats.annotations_removed += removed;
            page_changed = true;
        }

        if page_changed {
            stats.pages_modified += 1;
            log::debug!("Removed watermark content from page {}", page_number);
        }
    }

    if stats.removed_anything() {
        doc.prune_objects();
    }

    Ok(stats)
}

/// Pages (1-indexed) whose extracted text still contains a pattern
pub fn residual_pages<S: AsRef<str>>(doc: &Document, patterns: &[S]) -> Result<Vec<u32>> {
    let matcher = Matcher::new(patterns)?;
    Ok(doc
        .get_pages()
        .into_iter()
        .filter(|(_, page_id)| matcher.matches(&page_text(doc, *page_id)))
        .map(|(number, _)| number)
        .collect())
}

/// Remove watermarks from a PDF file
///
/// Uses `remove_strings` when given, otherwise auto-detects a watermark and
/// fails with [`Error::WatermarkNotDetected`] if none is found. The output
/// is checked afterwards; pages that still show a watermark are logged and
/// reported.
pub fn remove_watermarks(options: &WatermarkOptions) -> Result<RemovalReport> {
    let mut doc = open_pdf(&options.input_path)?;

    let watermarks = if options.remove_strings.is_empty() {
        log::info!("Auto-detecting watermark...");
        let detected = detect_watermark(&doc, options.sample_pages).ok_or(Error::WatermarkNotDetected)?;
        log::info!("Detected watermark: '{}'", detected);
        vec![detected]
    } else {
        options.remove_strings.clone()
    };

    let output_path = match &options.output_path {
        Some(path) => path.clone(),
        None => default_output_path(&options.input_path)?,
    };

    let quoted: Vec<String> = watermarks.iter().map(|w| format!("'{}'", w)).collect();
    log::info!("Removing watermark(s): {}", quoted.join(", "));

    let stats = remove_watermarks_in(&mut doc, &watermarks)?;
    log::info!(
        "Modified {} page(s): {} text operator(s), {} text object(s), {} annotation(s), {} form XObject(s)",
        stats.pages_modified,
        stats.text_ops_removed,
        stats.text_blocks_removed,
        stats.annotations_removed,
        stats.xobjects_modified
    );

    let remaining_pages = residual_pages(&doc, &watermarks)?;
    if remaining_pages.is_empty() {
        log::info!("Watermark removal verified");
    } else {
        log::warn!(
            "Watermark still found on pages {:?}; it may be drawn as an image or vector art",
            remaining_pages
        );
    }

    save_pdf(&mut doc, &output_path)?;

    Ok(RemovalReport {
        watermarks,
        output_path,
        stats,
        remaining_pages,
    })
}
