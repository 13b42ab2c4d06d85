//! Font decoding for text extraction
//!
//! Turns the bytes of a text-showing operator into Unicode and glyph
//! advances. Supports ToUnicode CMaps, `/Differences` encodings, the
//! WinAnsi fallback, simple-font `/Widths` and CID `/W` arrays.

use std::collections::HashMap;
use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use super::document::{as_number, resolve, resolved_dict, resolved_get, stream_bytes};

/// Character code to Unicode text
pub type CMap = HashMap<u32, String>;

/// Fonts of a resource dictionary keyed by resource name (e.g. `F1`)
pub type FontMap = HashMap<Vec<u8>, FontInfo>;

/// Glyph width used when a font does not say (thousandths of an em)
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Widest code range accepted from `/W` groups and ToUnicode bfranges
const MAX_CID_RANGE: u32 = 0xFFFF;

/// Decoding information for one font resource
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Type0 fonts use two-byte codes
    pub two_byte: bool,
    to_unicode: Option<CMap>,
    differences: HashMap<u32, char>,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
}

impl FontInfo {
    /// Read a font dictionary
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|name| name == b"Type0")
            .unwrap_or(false);

        let to_unicode = match resolved_get(doc, font, b"ToUnicode") {
            Some(Object::Stream(stream)) => stream_bytes(stream).map(|data| parse_tounicode_cmap(&data)),
            _ => None,
        };

        let mut info = FontInfo {
            two_byte,
            to_unicode,
            ..Default::default()
        };

        if let Some(encoding) = resolved_dict(doc, font, b"Encoding") {
            if let Some(Object::Array(diffs)) = resolved_get(doc, encoding, b"Differences") {
                info.differences = parse_differences(diffs);
            }
        }

        if two_byte {
            info.read_cid_widths(doc, font);
        } else {
            info.first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0)
                .max(0) as u32;
            if let Some(Object::Array(widths)) = resolved_get(doc, font, b"Widths") {
                info.widths = widths
                    .iter()
                    .map(|w| as_number(resolve(doc, w)).unwrap_or(0.0))
                    .collect();
            }
        }

        info
    }

    fn read_cid_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.default_width = 1000.0;

        let descendant = match resolved_get(doc, font, b"DescendantFonts") {
            Some(Object::Array(arr)) => arr.first().map(|d| resolve(doc, d)),
            _ => None,
        };
        let Some(Object::Dictionary(cid_font)) = descendant else {
            return;
        };

        if let Some(dw) = resolved_get(doc, cid_font, b"DW").and_then(as_number) {
            self.default_width = dw;
        }

        // /W mixes `c [w1 w2 ...]` and `c_first c_last w` groups
        let Some(Object::Array(w)) = resolved_get(doc, cid_font, b"W") else {
            return;
        };
        let items: Vec<&Object> = w.iter().map(|o| resolve(doc, o)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(first) = as_number(items[i]) else {
                i += 1;
                continue;
            };
            match items.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        let Some(cid) = u32::try_from(offset).ok().and_then(|o| (first as u32).checked_add(o)) else {
                            break;
                        };
                        if let Some(width) = as_number(resolve(doc, width)) {
                            self.cid_widths.insert(cid, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    if let (Some(last), Some(width)) = (as_number(last), items.get(i + 2).and_then(|o| as_number(o))) {
                        let (first, last) = (first as u32, last as u32);
                        if last >= first && last - first <= MAX_CID_RANGE {
                            for cid in first..=last {
                                self.cid_widths.insert(cid, width);
                            }
                        } else {
                            log::debug!("Ignoring CID width range {}..{}", first, last);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    /// Split a string operand into character codes
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Unicode text for one character code
    pub fn decode_code(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.get(&code)) {
            return text.clone();
        }
        if let Some(ch) = self.differences.get(&code) {
            return ch.to_string();
        }
        if self.two_byte {
            // Identity-H without a ToUnicode map has no recoverable text
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(|c| c.to_string())
                .unwrap_or_default();
        }
        win_ansi_char(code as u8).map(|c| c.to_string()).unwrap_or_default()
    }

    /// Unicode text for a string operand
    pub fn decode(&self, bytes: &[u8]) -> String {
        self.codes(bytes).into_iter().map(|code| self.decode_code(code)).collect()
    }

    /// Glyph advance in thousandths of an em
    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Horizontal displacement of a string operand in unscaled text space
    ///
    /// Follows the glyph positioning rule:
    /// `tx = (w0 * size + Tc + Tw) * Th`, with `Tw` only for single-byte code 32.
    pub fn advance(&self, bytes: &[u8], state: &TextMetrics) -> f32 {
        self.codes(bytes)
            .into_iter()
            .map(|code| {
                let word = if !self.two_byte && code == 32 { state.word_spacing } else { 0.0 };
                (self.width(code) / 1000.0 * state.font_size + state.char_spacing + word) * state.h_scale
            })
            .sum()
    }
}

impl Default for FontInfo {
    /// Unknown fonts decode as WinAnsi with average-width glyphs
    fn default() -> Self {
        Self {
            two_byte: false,
            to_unicode: None,
            differences: HashMap::new(),
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
        }
    }
}

/// Text state parameters that affect glyph advances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub font_size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// Horizontal scaling as a fraction (`Tz` / 100)
    pub h_scale: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
        }
    }
}

/// Load every font of a resource dictionary
pub fn load_fonts(doc: &Document, resources: Option<&Dictionary>) -> FontMap {
    let mut fonts = FontMap::new();
    let Some(font_dict) = resources.and_then(|r| resolved_dict(doc, r, b"Font")) else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        if let Object::Dictionary(font) = resolve(doc, value) {
            fonts.insert(name.clone(), FontInfo::from_dict(doc, font));
        }
    }
    fonts
}

/// Parse a ToUnicode CMap stream (`bfchar` and `bfrange` sections)
pub fn parse_tounicode_cmap(data: &[u8]) -> CMap {
    lazy_static! {
        static ref BFCHAR: Regex = Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
        static ref BFRANGE: Regex =
            Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
        static ref BFRANGE_ARRAY: Regex =
            Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*\[([^\]]*)\]").unwrap();
        static ref HEX: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
    }

    let content = String::from_utf8_lossy(data);
    let mut cmap = CMap::new();

    for section in sections(&content, "beginbfchar", "endbfchar") {
        for caps in BFCHAR.captures_iter(section) {
            if let (Ok(src), Some(dst)) = (u32::from_str_radix(&caps[1], 16), utf16_hex(&caps[2])) {
                cmap.insert(src, dst);
            }
        }
    }

    for section in sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            if let Some(caps) = BFRANGE_ARRAY.captures(line) {
                let (Ok(start), Ok(end)) = (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16)) else {
                    continue;
                };
                for (offset, dst) in HEX.captures_iter(&caps[3]).enumerate() {
                    let Some(src) = u32::try_from(offset).ok().and_then(|o| start.checked_add(o)) else {
                        break;
                    };
                    if src > end {
                        break;
                    }
                    if let Some(text) = utf16_hex(&dst[1]) {
                        cmap.insert(src, text);
                    }
                }
            } else if let Some(caps) = BFRANGE.captures(line) {
                let (Ok(start), Ok(end)) = (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16)) else {
                    continue;
                };
                let Some(mut units) = hex_units(&caps[3]) else {
                    continue;
                };
                // Ranges over a full code space are malformed
                if end < start || end - start > MAX_CID_RANGE || units.is_empty() {
                    continue;
                }
                for src in start..=end {
                    cmap.insert(src, String::from_utf16_lossy(&units));
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(1);
                    }
                }
            }
        }
    }

    cmap
}

fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut remaining = content;
    while let Some(start) = remaining.find(begin) {
        let after = &remaining[start + begin.len()..];
        match after.find(end) {
            Some(stop) => {
                found.push(&after[..stop]);
                remaining = &after[stop + end.len()..];
            }
            None => break,
        }
    }
    found
}

fn hex_units(hex: &str) -> Option<Vec<u16>> {
    if hex.len() <= 2 {
        return u16::from_str_radix(hex, 16).ok().map(|v| vec![v]);
    }
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect()
}

/// Destination strings in CMaps are UTF-16BE (surrogate pairs included)
fn utf16_hex(hex: &str) -> Option<String> {
    let units = hex_units(hex)?;
    let text = String::from_utf16_lossy(&units);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_differences(diffs: &[Object]) -> HashMap<u32, char> {
    let mut map = HashMap::new();
    let mut code = 0u32;
    for item in diffs {
        match item {
            Object::Integer(start) => code = (*start).max(0) as u32,
            Object::Name(name) => {
                if let Some(ch) = glyph_name_to_char(&String::from_utf8_lossy(name)) {
                    map.insert(code, ch);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

/// Map an Adobe glyph name to a character
///
/// Covers single letters, digits, common punctuation and `uniXXXX`/`uXXXX`.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }

    if let Some(hex) = name.strip_prefix("uni").or_else(|| name.strip_prefix('u')) {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c);
            }
        }
    }

    let c = match name {
        "space" | "nbspace" => ' ',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" | "minus" => '-',
        "endash" => '–',
        "emdash" => '—',
        "underscore" => '_',
        "slash" => '/',
        "backslash" => '\\',
        "parenleft" => '(',
        "parenright" => ')',
        "bracketleft" => '[',
        "bracketright" => ']',
        "braceleft" => '{',
        "braceright" => '}',
        "quotesingle" => '\'',
        "quotedbl" => '"',
        "quoteleft" => '‘',
        "quoteright" => '’',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "exclam" => '!',
        "question" => '?',
        "ampersand" => '&',
        "at" => '@',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "asterisk" => '*',
        "plus" => '+',
        "equal" => '=',
        "less" => '<',
        "greater" => '>',
        "bullet" => '•',
        "ellipsis" => '…',
        "periodcentered" => '·',
        "copyright" => '©',
        "registered" => '®',
        "trademark" => '™',
        "section" => '§',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        _ => return None,
    };
    Some(c)
}

/// WinAnsiEncoding; bytes outside 0x80-0x9F match Latin-1
pub fn win_ansi_char(byte: u8) -> Option<char> {
    let c = match byte {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        0x80..=0x9F => return None,
        b'\t' | b'\n' | b'\r' => ' ',
        0x00..=0x1F => return None,
        other => other as char,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_parse_bfchar_and_bfrange() {
        let data = b"/CIDInit /ProcSet findresource begin\n\
            2 beginbfchar\n<0003> <0020>\n<0011> <00410042>\nendbfchar\n\
            1 beginbfrange\n<0024> <0026> <0061>\nendbfrange\n\
            1 beginbfrange\n<0030> <0031> [<0066> <00660069>]\nendbfrange\nend";
        let cmap = parse_tounicode_cmap(data);
        assert_eq!(cmap.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(cmap.get(&0x11).map(String::as_str), Some("AB"));
        assert_eq!(cmap.get(&0x24).map(String::as_str), Some("a"));
        assert_eq!(cmap.get(&0x26).map(String::as_str), Some("c"));
        assert_eq!(cmap.get(&0x31).map(String::as_str), Some("fi"));
    }

    #[test]
    fn test_surrogate_pair_destination() {
        let cmap = parse_tounicode_cmap(b"beginbfchar\n<01> <D835DF0C>\nendbfchar");
        assert_eq!(cmap.get(&1).map(String::as_str), Some("\u{1D70C}"));
    }

    #[test]
    fn test_win_ansi_fallback() {
        let font = FontInfo::default();
        assert_eq!(font.decode(b"Caf\xe9 \x93ok\x94"), "Café “ok”");
    }

    #[test]
    fn test_differences_override_encoding() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![Object::Integer(65), Object::Name(b"uni263A".to_vec()), Object::Name(b"bullet".to_vec())],
            },
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.decode(b"ABC"), "\u{263A}•C");
    }

    #[test]
    fn test_simple_widths_and_advance() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Subtype" => "TrueType",
            "FirstChar" => Object::Integer(32),
            "Widths" => vec![Object::Integer(250), Object::Integer(0), Object::Integer(600)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.width(32), 250.0);
        assert_eq!(info.width(33), DEFAULT_GLYPH_WIDTH);
        assert_eq!(info.width(34), 600.0);
        assert_eq!(info.width(90), DEFAULT_GLYPH_WIDTH);

        let metrics = TextMetrics {
            font_size: 10.0,
            char_spacing: 1.0,
            word_spacing: 2.0,
            h_scale: 1.0,
        };
        // space: 2.5 + 1 + 2, quote: 6 + 1
        let advance = info.advance(b" \"", &metrics);
        assert!((advance - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_type0_two_byte_codes_and_cid_widths() {
        let mut doc = Document::with_version("1.5");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => Object::Integer(900),
            "W" => vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(300), Object::Integer(400)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(700),
            ],
        });
        let font = dictionary! {
            "Subtype" => "Type0",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert!(info.two_byte);
        assert_eq!(info.codes(&[0x00, 0x01, 0x00, 0x0B]), vec![1, 11]);
        assert_eq!(info.width(1), 300.0);
        assert_eq!(info.width(2), 400.0);
        assert_eq!(info.width(11), 700.0);
        assert_eq!(info.width(50), 900.0);
    }

    #[test]
    fn test_cid_widths_ignore_oversized_ranges() {
        let mut doc = Document::with_version("1.5");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "W" => vec![
                Object::Integer(4_294_967_295),
                Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
                Object::Integer(0),
                Object::Integer(30_000_000),
                Object::Integer(250),
                Object::Integer(5),
                Object::Integer(6),
                Object::Integer(800),
            ],
        });
        let font = dictionary! {
            "Subtype" => "Type0",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.width(u32::MAX), 500.0);
        assert_eq!(info.width(5), 800.0);
        assert_eq!(info.width(6), 800.0);
        // the 0..30000000 group is dropped, so code 100 falls back to /DW
        assert_eq!(info.width(100), 1000.0);
    }

    #[test]
    fn test_bfrange_array_stops_at_code_space_end() {
        let cmap = parse_tounicode_cmap(b"beginbfrange\n<FFFFFFFF> <FFFFFFFF> [<0041> <0042>]\nendbfrange");
        assert_eq!(cmap.get(&u32::MAX).map(String::as_str), Some("A"));
        assert_eq!(cmap.len(), 1);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_char("a"), Some('a'));
        assert_eq!(glyph_name_to_char("seven"), Some('7'));
        assert_eq!(glyph_name_to_char("uni00E9"), Some('é'));
        assert_eq!(glyph_name_to_char("g123"), None);
    }
}
