//! Idempotent insertion of tagged fragments into native source files.
//!
//! [`apply`] is a pure text transform: it never touches storage and never
//! fails on arbitrary input. It returns a [`PatchOutcome`] describing what
//! happened, and only [`PatchOutcome::Patched`] carries new text.
//!
//! Inserted code is wrapped in a pair of marker comments:
//!
//! ```text
//! // @generated begin <tag> - native-patcher (DO NOT MODIFY) sync-<xxh3 of fragment>
//! <fragment>
//! // @generated end <tag>
//! ```
//!
//! The begin marker records a hash of the fragment so a block written by an
//! older patch set (same tag, different fragment) is recognised as stale and
//! replaced rather than duplicated.

use crate::anchor::Anchor;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

const GENERATOR: &str = "native-patcher (DO NOT MODIFY)";
const BEGIN: &str = "@generated begin";
const END: &str = "@generated end";

/// A single idempotent insertion.
#[derive(Debug, Clone)]
pub struct InsertionRequest {
    /// Owner of the generated block; scopes stale-block replacement.
    pub tag: String,
    /// Literal code inserted between the markers.
    pub fragment: String,
    pub anchor: Anchor,
    /// Lines relative to the anchor line: negative is above, zero inserts
    /// right before the anchor line, positive below.
    pub line_offset: isize,
    /// Single-line comment token of the target language, e.g. `//`.
    pub comment: String,
}

impl InsertionRequest {
    pub fn new(tag: impl Into<String>, fragment: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            tag: tag.into(),
            fragment: fragment.into(),
            anchor,
            line_offset: 0,
            comment: "//".to_string(),
        }
    }

    pub fn with_offset(mut self, line_offset: isize) -> Self {
        self.line_offset = line_offset;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Opening marker line for this request.
    pub fn begin_marker(&self) -> String {
        begin_marker(&self.comment, &self.tag, &self.fragment)
    }

    /// Closing marker line for this request.
    pub fn end_marker(&self) -> String {
        end_marker(&self.comment, &self.tag)
    }
}

/// Result of [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked; only Patched carries new text"]
pub enum PatchOutcome {
    /// The fragment is already present.
    Unchanged,
    /// The fragment was inserted; holds the complete new text.
    Patched(String),
    /// No safe insertion point was found. Not an error.
    NotApplicable(String),
}

impl PatchOutcome {
    /// The text to keep after this outcome: the patched text, or `original`.
    pub fn text_or<'a>(&'a self, original: &'a str) -> &'a str {
        match self {
            PatchOutcome::Patched(text) => text,
            PatchOutcome::Unchanged | PatchOutcome::NotApplicable(_) => original,
        }
    }

    pub fn is_patched(&self) -> bool {
        matches!(self, PatchOutcome::Patched(_))
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, PatchOutcome::NotApplicable(_))
    }
}

/// Build the opening marker comment for a tagged block.
pub fn begin_marker(comment: &str, tag: &str, fragment: &str) -> String {
    format!(
        "{comment} {BEGIN} {tag} - {GENERATOR} sync-{:016x}",
        xxh3_64(fragment.as_bytes())
    )
}

/// Build the closing marker comment for a tagged block.
pub fn end_marker(comment: &str, tag: &str) -> String {
    format!("{comment} {END} {tag}")
}

/// Insert `request.fragment` into `source` exactly once.
pub fn apply(source: &str, request: &InsertionRequest) -> PatchOutcome {
    if source.contains(request.fragment.as_str()) {
        debug!(tag = %request.tag, "fragment already present");
        return PatchOutcome::Unchanged;
    }

    let begin = request.begin_marker();
    if source.contains(begin.as_str()) {
        debug!(tag = %request.tag, "generated block already present");
        return PatchOutcome::Unchanged;
    }

    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<&str> = source.split('\n').collect();

    let sanitized;
    let search_text = match find_block(&lines, &request.comment, &request.tag) {
        BlockSearch::Absent => source,
        BlockSearch::Found { start, end } => {
            debug!(tag = %request.tag, start, end, "removing stale generated block");
            lines.drain(start..=end);
            sanitized = lines.join("\n");
            sanitized.as_str()
        }
        BlockSearch::Unterminated { start } => {
            return PatchOutcome::NotApplicable(format!(
                "unterminated generated block for tag '{}' at line {}",
                request.tag,
                start + 1
            ));
        }
    };

    let Some(anchor) = request.anchor.first(search_text) else {
        return PatchOutcome::NotApplicable(format!(
            "no insertion point found for tag '{}' (anchor {})",
            request.tag, request.anchor
        ));
    };

    let index = isize::try_from(anchor.line)
        .ok()
        .and_then(|line| line.checked_add(request.line_offset))
        .and_then(|index| usize::try_from(index).ok())
        .filter(|index| *index <= lines.len());
    let Some(index) = index else {
        return PatchOutcome::NotApplicable(format!(
            "insertion point out of range for tag '{}': anchor line {} offset {}",
            request.tag,
            anchor.line + 1,
            request.line_offset
        ));
    };

    // Lines keep their own '\r' when split on '\n'; inserted ones get it
    // explicitly so CRLF files stay uniform.
    let cr = newline.strip_suffix('\n').unwrap_or("");
    let mut block: Vec<String> = Vec::new();
    block.push(format!("{begin}{cr}"));
    block.extend(
        request
            .fragment
            .split('\n')
            .map(|line| format!("{}{cr}", line.strip_suffix('\r').unwrap_or(line))),
    );
    block.push(format!("{}{cr}", request.end_marker()));

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + block.len());
    out.extend_from_slice(&lines[..index]);
    out.extend(block.iter().map(String::as_str));
    out.extend_from_slice(&lines[index..]);

    debug!(
        tag = %request.tag,
        anchor_line = anchor.line,
        insert_at = index,
        "inserted generated block"
    );
    PatchOutcome::Patched(out.join("\n"))
}

/// Remove the complete block owned by `tag`, if there is one.
///
/// Returns `None` when no terminated block exists.
pub fn remove_block(source: &str, comment: &str, tag: &str) -> Option<String> {
    let mut lines: Vec<&str> = source.split('\n').collect();
    match find_block(&lines, comment, tag) {
        BlockSearch::Found { start, end } => {
            lines.drain(start..=end);
            Some(lines.join("\n"))
        }
        BlockSearch::Absent | BlockSearch::Unterminated { .. } => None,
    }
}

enum BlockSearch {
    Absent,
    Found { start: usize, end: usize },
    Unterminated { start: usize },
}

/// Locate an existing block owned by `tag`. Tags compare as whole tokens.
fn find_block(lines: &[&str], comment: &str, tag: &str) -> BlockSearch {
    let Some(start) = lines
        .iter()
        .position(|line| marker_tag(line, comment, BEGIN) == Some(tag))
    else {
        return BlockSearch::Absent;
    };

    match lines[start + 1..]
        .iter()
        .position(|line| marker_tag(line, comment, END) == Some(tag))
    {
        Some(rel) => BlockSearch::Found {
            start,
            end: start + 1 + rel,
        },
        None => BlockSearch::Unterminated { start },
    }
}

/// Tag named by a marker line of the given kind, if `line` is one.
fn marker_tag<'a>(line: &'a str, comment: &str, kind: &str) -> Option<&'a str> {
    line.trim()
        .strip_prefix(comment)?
        .trim_start()
        .strip_prefix(kind)?
        .split_whitespace()
        .next()
}
