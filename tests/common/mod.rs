//! Shared helpers: small PDFs generated in memory

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};

/// A line of text placed at (x, y) in 12pt Helvetica
pub struct Line<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
}

pub fn line(x: f32, y: f32, text: &str) -> Line<'_> {
    Line { x, y, text }
}

fn page_content(lines: &[Line]) -> Vec<u8> {
    let mut operations = Vec::new();
    for line in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![Object::Real(line.x), Object::Real(line.y)]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }.encode().unwrap()
}

/// Build a document with one page per entry of `pages`
pub fn build_pdf(pages: &[Vec<Line>]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for lines in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), page_content(lines)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(kids.len() as i64),
            "Kids" => kids,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

/// Pages whose only text is `Page N`
pub fn numbered_pages(count: u32) -> Document {
    let texts: Vec<String> = (1..=count).map(|n| format!("Page {}", n)).collect();
    let pages: Vec<Vec<Line>> = texts.iter().map(|t| vec![line(72.0, 700.0, t)]).collect();
    build_pdf(&pages)
}

pub fn save(doc: &mut Document, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

/// Extracted text of each page, in order
pub fn page_texts(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|&id| pdf_tools::pdf::text::page_text(doc, id).trim().to_string())
        .collect()
}

pub fn page_id(doc: &Document, page: u32) -> ObjectId {
    doc.get_pages()[&page]
}
