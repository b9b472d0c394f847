//! Primary/fallback orchestration over [`merge::apply`](crate::merge::apply).
//!
//! Native lifecycle files come in more than one coding style, so a patch set
//! usually carries a precise primary anchor and a looser fallback. The
//! fallback only runs when the primary reports `NotApplicable`; `apply`
//! itself stays pattern-agnostic.

use crate::anchor::{line_of, Anchor, AnchorMatch};
use crate::merge::{self, InsertionRequest, PatchOutcome};
use std::fmt;
use tracing::debug;

/// Which request produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Second-chance insertion used when the primary anchor is missing.
#[derive(Debug, Clone)]
pub struct Fallback {
    pub request: InsertionRequest,
    /// Token that opens the anchored construct, usually `{`. When it starts
    /// on a later line than the anchor, the offset grows by the distance so
    /// the fragment lands inside the body.
    pub opening_token: Option<char>,
}

#[derive(Debug, Clone)]
pub struct TieredRequest {
    pub primary: InsertionRequest,
    pub fallback: Option<Fallback>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TieredOutcome should be checked; only Patched carries new text"]
pub struct TieredOutcome {
    pub outcome: PatchOutcome,
    /// `None` when neither tier applied.
    pub tier: Option<Tier>,
}

impl TieredRequest {
    pub fn new(primary: InsertionRequest) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// Apply the primary request, retrying with the fallback on a miss.
pub fn apply_tiered(source: &str, tiered: &TieredRequest) -> TieredOutcome {
    let primary = merge::apply(source, &tiered.primary);
    if primary.is_applicable() {
        return TieredOutcome {
            outcome: primary,
            tier: Some(Tier::Primary),
        };
    }

    let Some(fallback) = &tiered.fallback else {
        return TieredOutcome {
            outcome: primary,
            tier: None,
        };
    };

    debug!(
        tag = %tiered.primary.tag,
        fallback_tag = %fallback.request.tag,
        "primary anchor missed, trying fallback"
    );

    let request = match fallback_request(source, fallback) {
        Ok(request) => request,
        Err(reason) => {
            return TieredOutcome {
                outcome: PatchOutcome::NotApplicable(reason),
                tier: None,
            }
        }
    };

    let outcome = match merge::apply(source, &request) {
        // A block left by an earlier primary run must not survive next to the
        // fallback block.
        PatchOutcome::Patched(text) => PatchOutcome::Patched(
            merge::remove_block(&text, &tiered.primary.comment, &tiered.primary.tag)
                .unwrap_or(text),
        ),
        other => other,
    };

    let tier = outcome.is_applicable().then_some(Tier::Fallback);
    TieredOutcome { outcome, tier }
}

/// The fallback request with its offset moved past the opening token.
///
/// Matches that never open a body (a bare declaration ending in `;`) are
/// passed over; the offset is measured from the first match, which is where
/// `merge::apply` anchors, to the first match that does open one.
fn fallback_request(source: &str, fallback: &Fallback) -> Result<InsertionRequest, String> {
    let request = &fallback.request;
    let Some(token) = fallback.opening_token else {
        return Ok(request.clone());
    };

    // Line numbers must agree with the text merge::apply searches, which has
    // any stale block for this tag removed.
    let sanitized = merge::remove_block(source, &request.comment, &request.tag);
    let scan = sanitized.as_deref().unwrap_or(source);

    let matches = request.anchor.find_all(scan);
    let Some(first) = matches.first() else {
        return Ok(request.clone());
    };

    let Some((body, distance)) = matches
        .iter()
        .find_map(|found| distance_to_opening(scan, found, token).map(|d| (found, d)))
    else {
        return Err(format!(
            "fallback anchor for tag '{}' at line {} is not followed by '{}'",
            request.tag,
            first.line + 1,
            token
        ));
    };

    let extra = body.line - first.line + distance;
    if extra == 0 {
        return Ok(request.clone());
    }

    let offset = isize::try_from(extra)
        .ok()
        .and_then(|extra| request.line_offset.checked_add(extra))
        .ok_or_else(|| {
            format!(
                "insertion point out of range for tag '{}': offset {} plus {}",
                request.tag, request.line_offset, extra
            )
        })?;
    Ok(request.clone().with_offset(offset))
}

/// Lines between the first anchor match and the `token` that opens the
/// matched construct.
///
/// Only the continuation of the match is scanned: a `;`, `}` or `@end`
/// before the token means the construct has no body and yields `None`.
pub fn opening_line_distance(source: &str, anchor: &Anchor, token: char) -> Option<usize> {
    let found = anchor.first(source)?;
    distance_to_opening(source, &found, token)
}

fn distance_to_opening(source: &str, found: &AnchorMatch, token: char) -> Option<usize> {
    let rest = &source[found.byte_end..];
    let token_at = rest.find(token)?;
    let continuation = &rest[..token_at];
    if continuation.contains([';', '}']) || continuation.contains("@end") {
        return None;
    }
    Some(line_of(source, found.byte_end + token_at) - found.line)
}
