//! Integration tests for TOC links and outlines

mod common;

use common::{build_pdf, line, page_id, save};
use lopdf::{Document, Object, ObjectId};
use pdf_tools::pdf::{add_bookmarks, BookmarkOptions, OutlineStyle};
use pdf_tools::{Error, PageRange};
use tempfile::TempDir;

/// Page 1 holds the table of contents, pages 2 to 4 the body
fn book() -> Document {
    build_pdf(&[
        vec![
            line(72.0, 720.0, "Contents"),
            line(72.0, 690.0, "1 Introduction ........ 2"),
            line(72.0, 670.0, "2 Methods ........ 3"),
            line(90.0, 650.0, "2.1 Data collection ........ 3"),
            line(90.0, 630.0, "2.2 Analysis ........ 4"),
            line(72.0, 610.0, "3 Appendix ........ 99"),
        ],
        vec![line(72.0, 700.0, "The introduction starts here")],
        vec![line(72.0, 700.0, "Methods are described here")],
        vec![line(72.0, 700.0, "Analysis of the data")],
    ])
}

fn link_targets(doc: &Document, page: u32) -> Vec<ObjectId> {
    let page_dict = doc.get_dictionary(page_id(doc, page)).unwrap();
    let annots = match page_dict.get(b"Annots") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id).unwrap().as_array().unwrap().clone(),
        _ => Vec::new(),
    };
    annots
        .iter()
        .map(|annot| {
            let annot = doc.get_dictionary(annot.as_reference().unwrap()).unwrap();
            assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Link");
            let dest = annot.get(b"Dest").unwrap().as_array().unwrap();
            assert_eq!(dest[1].as_name().unwrap(), b"XYZ");
            dest[0].as_reference().unwrap()
        })
        .collect()
}

/// Titles of the top-level outline items, following First/Next
fn outline_titles(doc: &Document) -> Vec<String> {
    let catalog = doc.catalog().unwrap();
    let outlines = doc.get_dictionary(catalog.get(b"Outlines").unwrap().as_reference().unwrap()).unwrap();
    let mut titles = Vec::new();
    let mut next = outlines.get(b"First").and_then(Object::as_reference).ok();
    while let Some(id) = next {
        let item = doc.get_dictionary(id).unwrap();
        match item.get(b"Title").unwrap() {
            Object::String(bytes, _) => titles.push(String::from_utf8_lossy(bytes).into_owned()),
            other => panic!("unexpected title {:?}", other),
        }
        next = item.get(b"Next").and_then(Object::as_reference).ok();
    }
    titles
}

#[test]
fn test_links_each_valid_entry_to_its_page() {
    let temp_dir = TempDir::new().unwrap();
    let input = save(&mut book(), temp_dir.path(), "book.pdf");

    let report = add_bookmarks(&BookmarkOptions {
        input_path: input,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(report.output_path, temp_dir.path().join("book_linked.pdf"));
    assert_eq!(report.entries, 5);
    assert_eq!(report.links.added, 4);
    assert_eq!(report.links.out_of_range, 1);
    assert_eq!(report.toc_pages, vec![1]);

    let output = Document::load(&report.output_path).unwrap();
    let targets = link_targets(&output, 1);
    let expected: Vec<ObjectId> = [2, 3, 3, 4].iter().map(|&p| page_id(&output, p)).collect();
    assert_eq!(targets, expected);
    assert!(link_targets(&output, 2).is_empty());
}

#[test]
fn test_page_outline_has_one_item_per_page() {
    let temp_dir = TempDir::new().unwrap();
    let input = save(&mut book(), temp_dir.path(), "book.pdf");
    let output_path = temp_dir.path().join("out.pdf");

    let report = add_bookmarks(&BookmarkOptions {
        input_path: input,
        output_path: Some(output_path.clone()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(report.outline_items, 4);

    let output = Document::load(&output_path).unwrap();
    assert_eq!(
        outline_titles(&output),
        vec!["Page 1", "Page 2: 1 Introduction", "Page 3: 2 Methods", "Page 4: 2.2 Analysis"]
    );
}

#[test]
fn test_toc_outline_nests_subsections() {
    let temp_dir = TempDir::new().unwrap();
    let input = save(&mut book(), temp_dir.path(), "book.pdf");
    let output_path = temp_dir.path().join("out.pdf");

    let report = add_bookmarks(&BookmarkOptions {
        input_path: input,
        output_path: Some(output_path.clone()),
        outline: OutlineStyle::Toc,
        add_links: false,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(report.outline_items, 4);
    assert_eq!(report.links.added, 0);

    let output = Document::load(&output_path).unwrap();
    assert_eq!(outline_titles(&output), vec!["1 Introduction", "2 Methods"]);
    assert!(link_targets(&output, 1).is_empty());
}

#[test]
fn test_page_offset_shifts_targets() {
    let temp_dir = TempDir::new().unwrap();
    let input = save(&mut book(), temp_dir.path(), "book.pdf");
    let output_path = temp_dir.path().join("out.pdf");

    let report = add_bookmarks(&BookmarkOptions {
        input_path: input,
        output_path: Some(output_path.clone()),
        index_range: Some(PageRange::new(1, 1).unwrap()),
        page_offset: -1,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(report.links.added, 4);

    let output = Document::load(&output_path).unwrap();
    let expected: Vec<ObjectId> = [1, 2, 2, 3].iter().map(|&p| page_id(&output, p)).collect();
    assert_eq!(link_targets(&output, 1), expected);
}

#[test]
fn test_missing_toc_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut doc = build_pdf(&[
        vec![line(72.0, 700.0, "Just some prose")],
        vec![line(72.0, 700.0, "More prose without numbers")],
    ]);
    let input = save(&mut doc, temp_dir.path(), "plain.pdf");

    let err = add_bookmarks(&BookmarkOptions {
        input_path: input,
        ..Default::default()
    })
    .unwrap_err();

    assert!(matches!(err, Error::TocNotFound));
    assert!(!temp_dir.path().join("plain_linked.pdf").exists());
}

#[test]
fn test_index_range_outside_document() {
    let temp_dir = TempDir::new().unwrap();
    let input = save(&mut book(), temp_dir.path(), "book.pdf");

    let err = add_bookmarks(&BookmarkOptions {
        input_path: input,
        index_range: Some(PageRange::new(2, 7).unwrap()),
        ..Default::default()
    })
    .unwrap_err();

    assert!(matches!(err, Error::RangeOutOfBounds { page_count: 4, .. }));
}

#[test]
fn test_missing_input_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("out.pdf");

    let err = add_bookmarks(&BookmarkOptions {
        input_path: temp_dir.path().join("missing.pdf"),
        output_path: Some(output_path.clone()),
        ..Default::default()
    })
    .unwrap_err();

    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(!output_path.exists());
}
