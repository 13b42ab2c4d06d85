//! Table-of-contents heuristics
//!
//! Everything here works on extracted text lines; nothing touches the PDF
//! object model. [`score_toc_page`] and [`detect_toc_start`] find where a
//! table of contents begins, [`parse_toc_lines`] turns the lines of one page
//! into [`TocEntry`] values.

use lazy_static::lazy_static;
use regex::Regex;
use crate::pdf::geometry::Rect;
use crate::pdf::text::TextLine;

/// Pages examined when looking for the start of a table of contents
pub const TOC_SEARCH_PAGES: usize = 20;

/// Minimum score for a page to count as a table of contents
pub const TOC_MIN_SCORE: usize = 5;

/// Printed page numbers above this are treated as noise
pub const MAX_PAGE_NUMBER: u32 = 10_000;

const TOC_KEYWORDS: [&str; 4] = ["table of contents", "contents", "index", "table des matières"];

const BOILERPLATE: [&str; 2] = ["copyright ©", "all rights reserved"];

lazy_static! {
    /// A line that ends in a number, the shape of most TOC rows
    static ref TOC_LIKE_LINE: Regex = Regex::new(r"(?m).+?\s+\d+\s*$").unwrap();
    static ref SECTION_NUMBER: Regex = Regex::new(r"\d+\.\d+").unwrap();
    static ref SECTION_ONLY: Regex = Regex::new(r"^(\d+(?:\.\d+)*)\.?$").unwrap();
    static ref SECTION_PREFIX: Regex = Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+(.+)$").unwrap();
    static ref LEADER: Regex =
        Regex::new(r"^(?P<title>.*?\S)(?P<leader>\s*[.…·]{2,}[.…·\s]*|\s*…[.…·\s]*|\s*\t\s*|\s+)(?P<page>\S+)$").unwrap();
    static ref TRAILING_PAGE: Regex =
        Regex::new(r"^(?P<title>.*?)(?:\s*[.…·]{2,}[.…·\s]*|\s*…[.…·\s]*|\s+)(?P<page>\d+)$").unwrap();
    static ref PAGE_ONLY: Regex = Regex::new(r"^\d+$").unwrap();
    static ref TRAILING_LEADER: Regex = Regex::new(r"[.…·\s]+$").unwrap();
}

/// One detected table-of-contents row
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Section number as printed (`"2.1.3"`), if any
    pub section: Option<String>,
    pub title: String,
    /// Page number as printed in the TOC
    pub printed_page: u32,
    /// Nesting depth: 1 + number of dots in the section number
    pub level: u32,
    /// Page (1-indexed) the TOC row sits on
    pub source_page: u32,
    /// Bounding box of the row on its page
    pub rect: Rect,
}

impl TocEntry {
    /// Title prefixed with its section number
    pub fn display_title(&self) -> String {
        match &self.section {
            Some(section) => format!("{} {}", section, self.title),
            None => self.title.clone(),
        }
    }

    /// Section number as integers, for sorting (`"2.10"` after `"2.9"`)
    pub fn section_key(&self) -> Vec<u32> {
        self.section
            .as_deref()
            .map(|s| s.split('.').filter_map(|part| part.parse().ok()).collect())
            .unwrap_or_default()
    }
}

/// A row that looked like a TOC entry but could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub source_page: u32,
    pub text: String,
    pub reason: String,
}

/// Entries and skipped rows found on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TocPage {
    pub entries: Vec<TocEntry>,
    pub skipped: Vec<SkippedLine>,
}

/// Score how much a page's text looks like a table of contents
///
/// +10 per keyword present, plus the number of lines ending in a number
/// when there are more than 3, plus the number of `n.n` section numbers when
/// there are more than 2.
pub fn score_toc_page(text: &str) -> usize {
    let lower = text.to_lowercase();
    let mut score = TOC_KEYWORDS.iter().filter(|k| lower.contains(*k)).count() * 10;

    let toc_lines = toc_like_line_count(text);
    if toc_lines > 3 {
        score += toc_lines;
    }

    let sections = SECTION_NUMBER.find_iter(text).count();
    if sections > 2 {
        score += sections;
    }

    score
}

/// Number of lines shaped like `title ... number`
pub fn toc_like_line_count(text: &str) -> usize {
    TOC_LIKE_LINE.find_iter(text).count()
}

/// Index of the best-scoring page among the first [`TOC_SEARCH_PAGES`]
///
/// Ties keep the earlier page. Returns `None` when no page reaches
/// [`TOC_MIN_SCORE`].
pub fn detect_toc_start<S: AsRef<str>>(pages: &[S]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, text) in pages.iter().take(TOC_SEARCH_PAGES).enumerate() {
        let score = score_toc_page(text.as_ref());
        log::debug!("TOC score for page {}: {}", index + 1, score);
        if best.map_or(score > 0, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    best.filter(|(_, score)| *score >= TOC_MIN_SCORE).map(|(index, _)| index)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Leader {
    Dots,
    Gap,
    Space,
}

struct LeaderSplit<'t> {
    title: &'t str,
    page: &'t str,
    leader: Leader,
}

fn split_leader(text: &str) -> Option<LeaderSplit<'_>> {
    let caps = LEADER.captures(text)?;
    let leader_text = caps.name("leader")?.as_str();
    let leader = if leader_text.contains(['.', '…', '·']) {
        Leader::Dots
    } else if leader_text.contains('\t') {
        Leader::Gap
    } else {
        Leader::Space
    };
    Some(LeaderSplit {
        title: caps.name("title")?.as_str(),
        page: caps.name("page")?.as_str(),
        leader,
    })
}

/// Parse a printed page number, rejecting zero and implausibly large values
fn page_number(token: &str) -> Option<u32> {
    if !PAGE_ONLY.is_match(token) {
        return None;
    }
    token.parse::<u32>().ok().filter(|n| (1..=MAX_PAGE_NUMBER).contains(n))
}

fn clean_title(title: &str) -> String {
    let title = title.replace('\t', " ");
    TRAILING_LEADER.replace(title.trim(), "").trim().to_string()
}

fn is_skippable(text: &str) -> bool {
    let lower = text.to_lowercase();
    let bare = lower.trim().trim_end_matches([':', '.']);
    TOC_KEYWORDS.contains(&bare)
        || lower.contains("table of contents")
        || lower.contains("table des matières")
        || BOILERPLATE.iter().any(|b| lower.contains(b))
}

fn section_level(section: Option<&str>) -> u32 {
    section.map(|s| s.matches('.').count() as u32 + 1).unwrap_or(1)
}

/// Build an entry when the title carries real text
fn make_entry(section: Option<&str>, title: &str, printed_page: u32, source_page: u32, rect: Rect) -> Option<TocEntry> {
    let title = clean_title(title);
    let bare_title = title.replace('.', "");
    if bare_title.trim().is_empty() {
        return None;
    }
    if let Some(section) = section {
        if bare_title.trim() == section.replace('.', "") {
            return None;
        }
    }
    Some(TocEntry {
        section: section.map(str::to_string),
        title,
        printed_page,
        level: section_level(section),
        source_page,
        rect,
    })
}

enum SingleLine {
    Entry(TocEntry),
    Skipped(String),
    NoMatch,
}

/// `[section] title <leader> page` on one line
fn parse_single_line(line: &TextLine, source_page: u32) -> SingleLine {
    let Some(split) = split_leader(&line.text) else {
        return SingleLine::NoMatch;
    };

    let (section, title) = match SECTION_PREFIX.captures(split.title) {
        Some(caps) => (caps.get(1).map(|m| m.as_str()), caps.get(2).map_or("", |m| m.as_str())),
        None => (None, split.title),
    };

    if split.leader == Leader::Space && section.is_none() {
        return SingleLine::NoMatch;
    }

    match page_number(split.page) {
        Some(page) => match make_entry(section, title, page, source_page, line.rect) {
            Some(entry) => SingleLine::Entry(entry),
            None => SingleLine::NoMatch,
        },
        None if split.leader == Leader::Dots => {
            let reason = match split.page.parse::<u64>() {
                Ok(n) => format!("page number {} is out of range", n),
                Err(_) => format!("page number '{}' is not numeric", split.page),
            };
            SingleLine::Skipped(reason)
        }
        None => SingleLine::NoMatch,
    }
}

/// `title <leader> page` where the section number sits on another line
fn title_with_page(text: &str) -> Option<(&str, u32)> {
    let caps = TRAILING_PAGE.captures(text)?;
    let title = caps.name("title")?.as_str();
    let page = page_number(caps.name("page")?.as_str())?;
    if title.trim().is_empty() {
        return None;
    }
    Some((title, page))
}

/// Parse the lines of one page into table-of-contents entries
///
/// Lines must be ordered top to bottom. Besides single-line rows, three
/// multi-line layouts are joined:
///
/// - a section number alone, then `title ... page`
/// - a section number alone, a title, then the page number alone
/// - `section title`, then the rest of the title ending in the page number
pub fn parse_toc_lines(lines: &[TextLine], source_page: u32) -> TocPage {
    let mut result = TocPage::default();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        let text = line.text.trim();

        if text.is_empty() || is_skippable(text) || (text.chars().count() < 2 && !PAGE_ONLY.is_match(text)) {
            i += 1;
            continue;
        }

        match parse_single_line(line, source_page) {
            SingleLine::Entry(entry) => {
                result.entries.push(entry);
                i += 1;
                continue;
            }
            SingleLine::Skipped(reason) => {
                log::warn!("Skipping TOC line on page {}: '{}' ({})", source_page, text, reason);
                result.skipped.push(SkippedLine {
                    source_page,
                    text: text.to_string(),
                    reason,
                });
                i += 1;
                continue;
            }
            SingleLine::NoMatch => {}
        }

        let next = lines.get(i + 1).map(|l| l.text.trim());

        if let Some(caps) = SECTION_ONLY.captures(text) {
            let section = caps.get(1).map(|m| m.as_str());

            // "2.1" / "Background ..... 12"
            if let Some((title, page)) = next.and_then(title_with_page) {
                if !SECTION_ONLY.is_match(next.unwrap_or_default()) {
                    if let Some(entry) = make_entry(section, title, page, source_page, lines[i + 1].rect) {
                        result.entries.push(entry);
                        i += 2;
                        continue;
                    }
                }
            }

            // "2.1" / "Background" / "12"
            if let (Some(title), Some(third)) = (next, lines.get(i + 2).map(|l| l.text.trim())) {
                let starts_with_digit = title.starts_with(|c: char| c.is_ascii_digit());
                if let (false, Some(page)) = (starts_with_digit, page_number(third)) {
                    if let Some(entry) = make_entry(section, title, page, source_page, lines[i + 1].rect) {
                        result.entries.push(entry);
                        i += 3;
                        continue;
                    }
                }
            }
        } else if let Some(caps) = SECTION_PREFIX.captures(text) {
            // "3 Getting started with" / "the toolkit ..... 40"
            let next_is_section = next
                .map(|n| SECTION_ONLY.is_match(n) || SECTION_PREFIX.is_match(n))
                .unwrap_or(true);
            if let (false, Some((rest, page))) = (next_is_section, next.and_then(title_with_page)) {
                let section = caps.get(1).map(|m| m.as_str());
                let title = format!("{} {}", caps.get(2).map_or("", |m| m.as_str()).trim(), rest.trim());
                let rect = line.rect.union(&lines[i + 1].rect);
                if let Some(entry) = make_entry(section, &title, page, source_page, rect) {
                    result.entries.push(entry);
                    i += 2;
                    continue;
                }
            }
        }

        i += 1;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<TextLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let y = 700.0 - 14.0 * i as f32;
                TextLine {
                    text: text.to_string(),
                    rect: Rect::new(72.0, y - 2.0, 500.0, y + 10.0),
                }
            })
            .collect()
    }

    fn titles(page: &TocPage) -> Vec<(Option<&str>, &str, u32)> {
        page.entries
            .iter()
            .map(|e| (e.section.as_deref(), e.title.as_str(), e.printed_page))
            .collect()
    }

    #[test]
    fn test_score_toc_page_keywords_and_lines() {
        let text = "Table of Contents\n1 Intro ..... 3\n2 Setup ..... 7\n3 Usage ..... 12\n4 Notes ..... 20";
        // two keywords (table of contents, contents) + four TOC-like lines
        assert_eq!(score_toc_page(text), 24);
        assert_eq!(score_toc_page("Just a paragraph of prose."), 0);
    }

    #[test]
    fn test_score_counts_section_numbers() {
        let text = "1.1 a\n1.2 b\n1.3 c";
        assert_eq!(score_toc_page(text), 3);
    }

    #[test]
    fn test_detect_toc_start_picks_best_page() {
        let pages = vec![
            "Title page".to_string(),
            "Contents\nIntro ..... 3\nSetup ..... 7\nUsage ..... 9\nNotes ..... 11".to_string(),
            "Chapter 1".to_string(),
        ];
        assert_eq!(detect_toc_start(&pages), Some(1));
        assert_eq!(detect_toc_start(&["nothing here", "or here"]), None);
    }

    #[test]
    fn test_parse_single_line_entries() {
        let page = parse_toc_lines(
            &lines(&[
                "Table of Contents",
                "1 Introduction ........ 3",
                "1.1 Background 5",
                "Preface\t1",
                "2.3.1. Deep dive ... 42",
            ]),
            2,
        );
        assert_eq!(
            titles(&page),
            vec![
                (Some("1"), "Introduction", 3),
                (Some("1.1"), "Background", 5),
                (None, "Preface", 1),
                (Some("2.3.1"), "Deep dive", 42),
            ]
        );
        assert_eq!(page.entries[3].level, 3);
        assert_eq!(page.entries[0].source_page, 2);
        assert!(page.skipped.is_empty());
    }

    #[test]
    fn test_plain_prose_is_not_an_entry() {
        let page = parse_toc_lines(&lines(&["We shipped version 2", "Call me at 5"]), 1);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_unparseable_page_numbers_are_skipped() {
        let page = parse_toc_lines(
            &lines(&["Foreword ........ xii", "Appendix ........ 12000", "Index ........ 12a"]),
            4,
        );
        assert!(page.entries.is_empty());
        assert_eq!(page.skipped.len(), 3);
        assert!(page.skipped[0].reason.contains("not numeric"));
        assert!(page.skipped[1].reason.contains("out of range"));
        assert_eq!(page.skipped[2].source_page, 4);
    }

    #[test]
    fn test_multi_line_joins() {
        let page = parse_toc_lines(
            &lines(&[
                "1",
                "Copyright ........ 15",
                "2",
                "Getting Started",
                "17",
                "3 Working with the",
                "command line ........ 40",
            ]),
            1,
        );
        assert_eq!(
            titles(&page),
            vec![
                (Some("1"), "Copyright", 15),
                (Some("2"), "Getting Started", 17),
                (Some("3"), "Working with the command line", 40),
            ]
        );
        // The joined entry covers both rows
        assert!(page.entries[2].rect.y1 > page.entries[2].rect.y0 + 14.0);
    }

    #[test]
    fn test_digits_glued_to_a_word_are_not_page_numbers() {
        let page = parse_toc_lines(&lines(&["2.1", "Using Python3", "3 Getting started with", "MP3"]), 1);
        assert!(page.entries.is_empty(), "unexpected entries: {:?}", titles(&page));
    }

    #[test]
    fn test_title_equal_to_section_is_rejected() {
        let page = parse_toc_lines(&lines(&["1.1 1.1 ..... 4"]), 1);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_section_key_and_display_title() {
        let page = parse_toc_lines(&lines(&["2.10 Tables ..... 9"]), 1);
        let entry = &page.entries[0];
        assert_eq!(entry.section_key(), vec![2, 10]);
        assert_eq!(entry.display_title(), "2.10 Tables");
    }
}
