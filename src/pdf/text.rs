//! Positioned text recovered from page content streams
//!
//! A small interpreter walks the content operators, tracks the graphics and
//! text state, and emits one [`TextSpan`] per text-showing operator. Spans
//! are then grouped into [`TextLine`]s by baseline.

use std::collections::HashMap;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use super::document::{as_number, page_content, page_resources, resolve, resolved_dict, stream_bytes};
use super::fonts::{load_fonts, FontInfo, FontMap, TextMetrics};
use super::geometry::{Matrix, Rect};

/// Form XObjects nested deeper than this are not followed
pub(crate) const MAX_FORM_DEPTH: usize = 8;

/// `TJ` adjustments wider than this (thousandths of an em) read as a space
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Text drawn by one text-showing operator
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Start of the baseline in user space
    pub x: f32,
    pub y: f32,
    /// Horizontal extent in user space
    pub width: f32,
    /// Effective font size in user space
    pub font_size: f32,
    /// Index of the BT..ET object the span came from
    pub block: usize,
}

impl TextSpan {
    fn rect(&self) -> Rect {
        let size = self.font_size.max(1.0);
        Rect::new(self.x, self.y - 0.2 * size, self.x + self.width, self.y + 0.8 * size)
    }
}

/// A visual line of text
///
/// Wide horizontal gaps between spans are kept as a tab so table-of-contents
/// leaders made of whitespace survive.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub rect: Rect,
}

/// Operand helpers
fn number(operands: &[Object], index: usize) -> f32 {
    operands.get(index).and_then(as_number).unwrap_or(0.0)
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(as_number).collect()
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    metrics: TextMetrics,
    leading: f32,
    rise: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font: None,
            metrics: TextMetrics::default(),
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    spans: Vec<TextSpan>,
    blocks: usize,
}

impl<'a> Interpreter<'a> {
    fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, base: Matrix, depth: usize) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(e) => {
                log::debug!("Could not decode content stream: {}", e);
                return;
            }
        };

        let fonts = load_fonts(self.doc, resources);
        let fallback = FontInfo::default();
        let mut state = GraphicsState::new(base);
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::identity();
        let mut tlm = Matrix::identity();

        for op in &operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_values(&numbers(operands)) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::identity();
                    tlm = Matrix::identity();
                    self.blocks += 1;
                }
                "Tf" => {
                    state.font = operands.first().and_then(|o| o.as_name().ok()).map(|n| n.to_vec());
                    state.metrics.font_size = number(operands, 1);
                }
                "Tc" => state.metrics.char_spacing = number(operands, 0),
                "Tw" => state.metrics.word_spacing = number(operands, 0),
                "Tz" => state.metrics.h_scale = number(operands, 0) / 100.0,
                "TL" => state.leading = number(operands, 0),
                "Ts" => state.rise = number(operands, 0),
                "Td" => {
                    tlm = Matrix::translate(number(operands, 0), number(operands, 1)).then(&tlm);
                    tm = tlm;
                }
                "TD" => {
                    state.leading = -number(operands, 1);
                    tlm = Matrix::translate(number(operands, 0), number(operands, 1)).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_values(&numbers(operands)) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" | "'" | "\"" | "TJ" => {
                    if op.operator == "'" || op.operator == "\"" {
                        if op.operator == "\"" {
                            state.metrics.word_spacing = number(operands, 0);
                            state.metrics.char_spacing = number(operands, 1);
                        }
                        tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                        tm = tlm;
                    }
                    let font = state.font.as_ref().and_then(|name| fonts.get(name)).unwrap_or(&fallback);
                    tm = self.show(op, font, &state, tm);
                }
                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                            self.run_form(name, resources, state.ctm, depth);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Emit a span for a text-showing operator and return the advanced text matrix
    fn show(&mut self, op: &Operation, font: &FontInfo, state: &GraphicsState, tm: Matrix) -> Matrix {
        let metrics = &state.metrics;
        let start = tm.then(&state.ctm);
        let (x, y) = start.apply(0.0, state.rise);
        let mut text = String::new();
        let mut advance = 0.0;

        match op.operator.as_str() {
            "TJ" => {
                let items = op.operands.first().and_then(|o| o.as_array().ok()).map(Vec::as_slice).unwrap_or(&[]);
                for item in items {
                    match item {
                        Object::String(bytes, _) => {
                            text.push_str(&font.decode(bytes));
                            advance += font.advance(bytes, metrics);
                        }
                        other => {
                            if let Some(adjust) = as_number(other) {
                                advance -= adjust / 1000.0 * metrics.font_size * metrics.h_scale;
                                if adjust < -TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                }
            }
            _ => {
                // Tj has the string first; " has it third
                if let Some(Object::String(bytes, _)) = op.operands.last() {
                    text.push_str(&font.decode(bytes));
                    advance += font.advance(bytes, metrics);
                }
            }
        }

        let next = Matrix::translate(advance, 0.0).then(&tm);
        let (end_x, _) = next.then(&state.ctm).apply(0.0, state.rise);

        if !text.trim().is_empty() {
            self.spans.push(TextSpan {
                text,
                x: x.min(end_x),
                y,
                width: (end_x - x).abs(),
                font_size: metrics.font_size.abs() * start.vertical_scale(),
                block: self.blocks,
            });
        }

        next
    }

    fn run_form(&mut self, name: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let Some(xobjects) = resources.and_then(|r| resolved_dict(doc, r, b"XObject")) else {
            return;
        };
        let Some(Object::Stream(form)) = xobjects.get(name).ok().map(|o| resolve(doc, o)) else {
            return;
        };
        if !is_form_xobject(form) {
            return;
        }

        let matrix = match form.dict.get(b"Matrix") {
            Ok(Object::Array(values)) => {
                let values: Vec<f32> = values.iter().filter_map(as_number).collect();
                Matrix::from_values(&values).unwrap_or_default()
            }
            _ => Matrix::identity(),
        };
        // Forms without their own resources use the caller's
        let form_resources = resolved_dict(doc, &form.dict, b"Resources").or(resources);

        if let Some(bytes) = stream_bytes(form) {
            self.run(&bytes, form_resources, matrix.then(&ctm), depth + 1);
        }
    }
}

pub(crate) fn is_form_xobject(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(|s| s.as_name())
        .map(|s| s == b"Form")
        .unwrap_or(false)
}

/// Text spans of a page in content order
pub fn page_spans(doc: &Document, page_id: ObjectId) -> Vec<TextSpan> {
    let mut interpreter = Interpreter {
        doc,
        spans: Vec::new(),
        blocks: 0,
    };
    let content = page_content(doc, page_id);
    interpreter.run(&content, page_resources(doc, page_id), Matrix::identity(), 0);
    interpreter.spans
}

/// Group spans into lines, top of the page first
pub fn group_lines(spans: &[TextSpan]) -> Vec<TextLine> {
    let mut ordered: Vec<&TextSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<&TextSpan>> = Vec::new();
    let mut baseline = f32::NAN;
    for span in ordered {
        let tolerance = 0.5 * span.font_size.max(1.0);
        if !rows.is_empty() && (span.y - baseline).abs() <= tolerance {
            if let Some(row) = rows.last_mut() {
                row.push(span);
            }
        } else {
            baseline = span.y;
            rows.push(vec![span]);
        }
    }

    rows.into_iter()
        .filter_map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            let mut text = String::new();
            let mut rect = row[0].rect();
            let mut prev_end = row[0].x;
            for span in &row {
                if !text.is_empty() {
                    let size = span.font_size.max(1.0);
                    let gap = span.x - prev_end;
                    if gap >= 3.0 * size {
                        text.push('\t');
                    } else if gap >= 0.15 * size && !text.ends_with(' ') && !span.text.starts_with(' ') {
                        text.push(' ');
                    }
                }
                text.push_str(&span.text);
                rect = rect.union(&span.rect());
                prev_end = prev_end.max(span.x + span.width);
            }
            let text = text.trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(TextLine { text, rect })
            }
        })
        .collect()
}

/// Text lines of a page, top to bottom
pub fn page_lines(doc: &Document, page_id: ObjectId) -> Vec<TextLine> {
    group_lines(&page_spans(doc, page_id))
}

/// Plain text of a page, one line per row
pub fn page_text(doc: &Document, page_id: ObjectId) -> String {
    lines_to_text(&page_lines(doc, page_id))
}

pub fn lines_to_text(lines: &[TextLine]) -> String {
    lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n")
}

/// Text of each BT..ET object on a page, in drawing order
pub fn text_blocks(spans: &[TextSpan]) -> Vec<String> {
    let mut order: Vec<usize> = Vec::new();
    let mut blocks: HashMap<usize, String> = HashMap::new();
    for span in spans {
        let text = blocks.entry(span.block).or_insert_with(|| {
            order.push(span.block);
            String::new()
        });
        if !text.is_empty() && !text.ends_with(' ') {
            text.push(' ');
        }
        text.push_str(span.text.trim());
    }
    order
        .into_iter()
        .filter_map(|block| blocks.remove(&block))
        .collect()
}

/// Fonts available to a page (resources inherited through the page tree)
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> FontMap {
    load_fonts(doc, page_resources(doc, page_id))
}
