//! Anchor patterns: where in a source file a fragment belongs.
//!
//! An anchor is either a regex or a literal search string. Matching is
//! stateless: [`Anchor::find_all`] always scans the whole text and returns
//! every match in order, each tagged with the zero-based line its first
//! byte sits on.

use crate::cache;
use regex::Regex;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("invalid anchor pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("anchor search text is empty")]
    EmptySearch,
}

/// A text pattern identifying the line near which a fragment is inserted.
#[derive(Debug, Clone)]
pub enum Anchor {
    Regex(Regex),
    Literal(String),
}

/// A single anchor match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Zero-based line containing `byte_start`
    pub line: usize,
}

impl Anchor {
    /// Compile a regex anchor, going through the thread-local cache.
    pub fn regex(pattern: &str) -> Result<Self, AnchorError> {
        cache::get_or_compile_regex(pattern)
            .map(Anchor::Regex)
            .map_err(|source| AnchorError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Literal anchor. An empty search string would match everywhere.
    pub fn literal(search: impl Into<String>) -> Result<Self, AnchorError> {
        let search = search.into();
        if search.is_empty() {
            return Err(AnchorError::EmptySearch);
        }
        Ok(Anchor::Literal(search))
    }

    /// The pattern or search text this anchor was built from.
    pub fn as_str(&self) -> &str {
        match self {
            Anchor::Regex(re) => re.as_str(),
            Anchor::Literal(search) => search,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Anchor::Regex(re) => re.is_match(text),
            Anchor::Literal(search) => text.contains(search.as_str()),
        }
    }

    /// Every match in `text`, in order of appearance.
    pub fn find_all(&self, text: &str) -> Vec<AnchorMatch> {
        let spans: Vec<(usize, usize)> = match self {
            Anchor::Regex(re) => re
                .find_iter(text)
                .map(|m| (m.start(), m.end()))
                .collect(),
            Anchor::Literal(search) => text
                .match_indices(search.as_str())
                .map(|(start, s)| (start, start + s.len()))
                .collect(),
        };

        // Line numbers are computed incrementally; matches arrive in order.
        let mut line = 0;
        let mut scanned = 0;
        spans
            .into_iter()
            .map(|(byte_start, byte_end)| {
                line += count_newlines(&text[scanned..byte_start]);
                scanned = byte_start;
                AnchorMatch {
                    byte_start,
                    byte_end,
                    line,
                }
            })
            .collect()
    }

    /// The first match, which is what insertion is anchored on.
    pub fn first(&self, text: &str) -> Option<AnchorMatch> {
        let (byte_start, byte_end) = match self {
            Anchor::Regex(re) => re.find(text).map(|m| (m.start(), m.end()))?,
            Anchor::Literal(search) => text
                .find(search.as_str())
                .map(|start| (start, start + search.len()))?,
        };
        Some(AnchorMatch {
            byte_start,
            byte_end,
            line: line_of(text, byte_start),
        })
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Regex(re) => write!(f, "/{}/", re.as_str()),
            Anchor::Literal(search) => write!(f, "{search:?}"),
        }
    }
}

/// Zero-based line index of `byte` in `text`.
pub fn line_of(text: &str, byte: usize) -> usize {
    count_newlines(&text[..byte.min(text.len())])
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}
