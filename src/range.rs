//! Page range arguments
//!
//! Ranges are 1-indexed and inclusive, written as `start,end` or `start-end`.

use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};

/// An inclusive, 1-indexed range of pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// First page (1-indexed)
    pub start: u32,
    /// Last page (1-indexed, inclusive)
    pub end: u32,
}

impl PageRange {
    /// Create a range, rejecting page 0 and inverted bounds
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end == 0 {
            return Err(Error::InvalidRange(format!("{},{}", start, end)));
        }
        if start > end {
            return Err(Error::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Check that the range fits in a document of `page_count` pages
    pub fn validate(&self, page_count: u32) -> Result<()> {
        if self.end > page_count {
            return Err(Error::RangeOutOfBounds {
                start: self.start,
                end: self.end,
                page_count,
            });
        }
        Ok(())
    }

    /// Whether the 1-indexed page lies inside the range
    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// Iterate over the page numbers in order
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl FromStr for PageRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        // Comma wins over dash so "3,14" and "3-14" both work
        let parts: Vec<&str> = if trimmed.contains(',') {
            trimmed.split(',').collect()
        } else if trimmed.contains('-') {
            trimmed.split('-').collect()
        } else {
            return Err(Error::InvalidRange(trimmed.to_string()));
        };

        if parts.len() != 2 {
            return Err(Error::InvalidRange(trimmed.to_string()));
        }

        let parse = |part: &str| -> Result<u32> {
            part.trim()
                .parse::<u32>()
                .map_err(|_| Error::InvalidRange(trimmed.to_string()))
        };

        PageRange::new(parse(parts[0])?, parse(parts[1])?)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
