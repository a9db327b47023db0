//! Anchor reconciliation.
//!
//! Upstream offsets index into the text the model produced before
//! sanitization, so they rarely line up with the final analysis. The
//! reconciler recomputes every span against the final text.
//!
//! # Strategy
//! 1. Normalize the segment (literal `\n`, degree variants, surrounding whitespace)
//! 2. Strip a leading bold header or bullet marker
//! 3. Accept the claimed span if it slices to exactly the segment text
//! 4. Otherwise take the first exact occurrence
//! 5. Otherwise match a prefix fingerprint and extend by the segment length
//! 6. Otherwise keep the segment unanchored
//!
//! All offsets are char indices into [`AnchorReconciler::text`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AnchorPolicy;

lazy_static! {
    /// `**Label:**` heading at segment start
    static ref BOLD_HEADER: Regex = Regex::new(r"^\s*\*\*[^*\n]{1,80}\*\*:?\s*").unwrap();

    /// List marker at segment start: `-`, `*`, `•`, `+` or `1.` / `1)`
    static ref BULLET: Regex = Regex::new(r"^\s*(?:[-*•+]|\d{1,3}[.)])\s+").unwrap();
}

/// Degree-sign spellings seen in model and search output.
const DEGREE_VARIANTS: &[(&str, &str)] = &[
    ("Â°", "°"),
    ("&deg;", "°"),
    ("\\u00b0", "°"),
    ("\\u00B0", "°"),
    ("º", "°"),
    ("˚", "°"),
    ("℃", "°C"),
    ("℉", "°F"),
];

/// Half-open char range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a segment was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMethod {
    Exact,
    Fingerprint,
    Unanchored,
}

/// Result of anchoring one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub span: Option<Span>,
    pub method: AnchorMethod,
    /// Segment text; for anchored segments, exactly the spanned slice
    pub text: String,
    /// Chars of header or bullet removed from the front of the segment
    pub trimmed_prefix: usize,
}

impl Anchor {
    pub fn is_anchored(&self) -> bool {
        self.span.is_some()
    }
}

/// Slice `text` by char indices. `None` if the span is out of range or inverted.
pub fn slice_chars(text: &str, span: Span) -> Option<&str> {
    if span.start > span.end {
        return None;
    }
    let start = byte_offset(text, span.start)?;
    let end = byte_offset(text, span.end)?;
    text.get(start..end)
}

fn byte_offset(text: &str, char_index: usize) -> Option<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .nth(char_index)
}

fn char_index(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

/// Replace degree-sign variants with `°`.
pub fn normalize_degrees(text: &str) -> String {
    DEGREE_VARIANTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn normalize_segment(text: &str) -> String {
    normalize_degrees(&text.replace("\\n", "\n")).trim().to_string()
}

/// Remove leading headers and bullets, returning the rest and the chars removed.
fn strip_label(text: &str) -> (&str, usize) {
    let mut rest = text;
    let mut trimmed = 0;

    loop {
        let found = BOLD_HEADER.find(rest).or_else(|| BULLET.find(rest));
        match found {
            Some(m) if m.end() < rest.len() => {
                trimmed += rest[..m.end()].chars().count();
                rest = &rest[m.end()..];
            }
            _ => break,
        }
    }

    (rest, trimmed)
}

/// Locates segments inside the final analysis text.
pub struct AnchorReconciler {
    text: String,
    char_len: usize,
    policy: AnchorPolicy,
}

impl AnchorReconciler {
    /// Create a reconciler over `analysis`, which is degree-normalized and trimmed.
    pub fn new(analysis: &str, policy: AnchorPolicy) -> Self {
        let text = normalize_degrees(analysis).trim().to_string();
        let char_len = text.chars().count();
        Self {
            text,
            char_len,
            policy,
        }
    }

    /// The canonical analysis text all spans refer to.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Anchor one segment, optionally checking the span the tool claimed.
    pub fn anchor(&self, segment: &str, claimed: Option<Span>) -> Anchor {
        let normalized = normalize_segment(segment);
        let (content, trimmed_prefix) = strip_label(&normalized);

        if content.is_empty() {
            return unanchored(content, trimmed_prefix);
        }

        if let Some(span) = claimed {
            if slice_chars(&self.text, span) == Some(content) {
                return Anchor {
                    span: Some(span),
                    method: AnchorMethod::Exact,
                    text: content.to_string(),
                    trimmed_prefix,
                };
            }
        }

        let content_len = content.chars().count();

        if let Some(byte) = self.text.find(content) {
            let start = char_index(&self.text, byte);
            return Anchor {
                span: Some(Span::new(start, start + content_len)),
                method: AnchorMethod::Exact,
                text: content.to_string(),
                trimmed_prefix,
            };
        }

        let fingerprint_len = content_len.min(self.policy.fingerprint_chars);
        if fingerprint_len >= self.policy.min_fingerprint_chars {
            let fingerprint_end = byte_offset(content, fingerprint_len).unwrap_or(content.len());
            let fingerprint = &content[..fingerprint_end];

            if let Some(byte) = self.text.find(fingerprint) {
                let start = char_index(&self.text, byte);
                let span = Span::new(start, (start + content_len).min(self.char_len));
                if let Some(slice) = slice_chars(&self.text, span) {
                    return Anchor {
                        span: Some(span),
                        method: AnchorMethod::Fingerprint,
                        text: slice.to_string(),
                        trimmed_prefix,
                    };
                }
            }
        }

        unanchored(content, trimmed_prefix)
    }
}

fn unanchored(text: &str, trimmed_prefix: usize) -> Anchor {
    Anchor {
        span: None,
        method: AnchorMethod::Unanchored,
        text: text.to_string(),
        trimmed_prefix,
    }
}
