//! Opening, inspecting and saving documents

use std::path::{Path, PathBuf};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use crate::error::{Error, Result};

/// Open an input PDF after checking that it exists and looks like a PDF
///
/// Fails with [`Error::EmptyPdf`] for documents without pages.
pub fn open_pdf(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(Error::NotPdf(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    log::debug!("Loaded {} ({} pages)", path.display(), doc.get_pages().len());
    Ok(doc)
}

/// Compress and write a document, creating the output directory if needed
pub fn save_pdf(doc: &mut Document, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    doc.compress();
    doc.save(path)?;
    Ok(())
}

/// Count pages by reading the Count field from the Pages dictionary
///
/// Falls back to walking the page tree when the catalog is unusual.
pub fn page_count(doc: &Document) -> u32 {
    count_pages_from_catalog(doc).unwrap_or_else(|_| doc.get_pages().len() as u32)
}

fn count_pages_from_catalog(doc: &Document) -> Result<u32> {
    let catalog = catalog(doc)?;

    let pages_id = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("Pages is not a reference".to_string())),
    };

    let pages_dict = doc.get_dictionary(pages_id)?;
    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as u32),
        _ => Err(Error::General("Count is not an integer".to_string())),
    }
}

/// Count the pages of a PDF on disk
pub fn count_pages(path: &Path) -> Result<u32> {
    let doc = open_pdf(path)?;
    Ok(page_count(&doc))
}

/// Object id of the document catalog
pub fn catalog_id(doc: &Document) -> Result<ObjectId> {
    match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(Error::General("Root is not a reference".to_string())),
        Err(_) => Err(Error::General("No Root in trailer".to_string())),
    }
}

/// The document catalog dictionary
pub fn catalog(doc: &Document) -> Result<&Dictionary> {
    let id = catalog_id(doc)?;
    Ok(doc.get_dictionary(id)?)
}

/// Follow a reference (one level) and return the target object
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Look up a dictionary entry and resolve it if it is a reference
pub fn resolved_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Look up a dictionary-valued entry, following a reference if needed
pub fn resolved_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    resolved_get(doc, dict, key).and_then(|obj| obj.as_dict().ok())
}

/// Read a numeric operand or array element
pub fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Find the resources that apply to a page, walking up the page tree
///
/// `/Resources` is inheritable, so a page without its own entry uses the
/// nearest ancestor's.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Page trees deeper than this are malformed
    for _ in 0..64 {
        if let Some(resources) = resolved_dict(doc, current, b"Resources") {
            return Some(resources);
        }
        current = match current.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_dictionary(*parent_id).ok()?,
            _ => return None,
        };
    }
    None
}

/// Collect the object ids of a page's content streams, in drawing order
pub fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // Contents may point at an array of references
            Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Decoded bytes of a stream, or `None` when a filter cannot be undone
pub fn stream_bytes(stream: &lopdf::Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Concatenated, decoded content of all of a page's content streams
pub fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut content = Vec::new();
    for id in content_stream_ids(doc, page_id) {
        if let Ok(Object::Stream(stream)) = doc.get_object(id) {
            match stream_bytes(stream) {
                Some(bytes) => {
                    content.extend_from_slice(&bytes);
                    content.push(b'\n');
                }
                None => log::debug!("Skipping undecodable content stream {:?}", id),
            }
        }
    }
    content
}

/// Replace a page's content with a single new stream
pub fn set_page_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = doc.add_object(lopdf::Stream::new(Dictionary::new(), content));

    let page_obj = doc.get_object_mut(page_id)?;
    if let Object::Dictionary(ref mut page_dict) = page_obj {
        page_dict.set("Contents", Object::Reference(stream_id));
    }

    Ok(())
}

/// Encode a text string for use in a PDF dictionary (outline titles etc.)
///
/// ASCII stays a literal string; anything else becomes UTF-16BE with a BOM.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string (UTF-16BE with BOM, or PDFDocEncoding)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Output path next to the input: `<dir>/<stem><suffix>.pdf`
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.pdf", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_file() {
        let result = open_pdf(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_open_rejects_non_pdf_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(matches!(open_pdf(&path).unwrap_err(), Error::NotPdf(_)));
    }

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_text_string_ascii_and_unicode() {
        assert_eq!(
            text_string("Intro"),
            Object::String(b"Intro".to_vec(), StringFormat::Literal)
        );
        match text_string("Préface") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(decode_text_string(&bytes), "Préface");
            }
            other => panic!("unexpected object {:?}", other),
        }
    }

    #[test]
    fn test_sibling_path() {
        let path = sibling_path(Path::new("/tmp/book.pdf"), "_10-20");
        assert_eq!(path, PathBuf::from("/tmp/book_10-20.pdf"));
        let path = sibling_path(Path::new("book.PDF"), "_linked");
        assert_eq!(path, PathBuf::from("book_linked.pdf"));
    }
}
