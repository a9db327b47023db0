//! Core types for VeriScan.
//!
//! These are the shapes that leave the pipeline: the verdict vocabulary,
//! the reconciled segment, and the final [`AnalysisResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::anchor::{AnchorMethod, Span};
use crate::evidence::{Citation, ScannedSource};
use crate::scorer::ReliabilityReport;
use crate::ReconcileError;

/// Fact-check verdict.
///
/// Serialized as SCREAMING_SNAKE_CASE (`MOSTLY_TRUE`, `NOT_A_CLAIM`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    True,
    MostlyTrue,
    Mixture,
    Misleading,
    MostlyFalse,
    False,
    Unverifiable,
    NotAClaim,
}

impl Verdict {
    pub const ALL: [Verdict; 8] = [
        Verdict::True,
        Verdict::MostlyTrue,
        Verdict::Mixture,
        Verdict::Misleading,
        Verdict::MostlyFalse,
        Verdict::False,
        Verdict::Unverifiable,
        Verdict::NotAClaim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "TRUE",
            Verdict::MostlyTrue => "MOSTLY_TRUE",
            Verdict::Mixture => "MIXTURE",
            Verdict::Misleading => "MISLEADING",
            Verdict::MostlyFalse => "MOSTLY_FALSE",
            Verdict::False => "FALSE",
            Verdict::Unverifiable => "UNVERIFIABLE",
            Verdict::NotAClaim => "NOT_A_CLAIM",
        }
    }

    /// Parse a model-supplied verdict, tolerating case, spaces and hyphens.
    ///
    /// `"mostly true"`, `"Mostly-True"` and `"MOSTLY_TRUE"` all parse.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        Self::ALL.into_iter().find(|v| v.as_str() == key)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of input the user submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Url,
    Image,
    Document,
}

/// Metadata the model reports about the submitted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(rename = "type")]
    pub kind: InputKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

/// Rhetorical observations about the submitted content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaLiteracy {
    #[serde(default)]
    pub logical_fallacies: Vec<String>,

    #[serde(default)]
    pub tone_analysis: String,
}

/// A grounding segment after sanitization and anchoring.
///
/// `chunk_indices` only holds indices that resolve to an evidence chunk, and
/// `confidence_scores` is aligned with it position by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub span: Option<Span>,
    pub chunk_indices: Vec<usize>,
    pub confidence_scores: Vec<f64>,
    pub anchor: AnchorMethod,
}

impl Segment {
    /// Unanchored segment with no sources, mostly useful in tests.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            span: None,
            chunk_indices: Vec::new(),
            confidence_scores: Vec::new(),
            anchor: AnchorMethod::Unanchored,
        }
    }

    pub fn with_source(mut self, chunk_index: usize, confidence: f64) -> Self {
        self.chunk_indices.push(chunk_index);
        self.confidence_scores.push(confidence);
        self
    }

    pub fn with_span(mut self, span: Span, method: AnchorMethod) -> Self {
        self.span = Some(span);
        self.anchor = method;
        self
    }

    pub fn is_anchored(&self) -> bool {
        self.span.is_some()
    }

    /// Wire form, with `-1` offsets when unanchored.
    pub fn to_support(&self) -> GroundingSupport {
        let (start_index, end_index) = match self.span {
            Some(span) => (span.start as i64, span.end as i64),
            None => (-1, -1),
        };
        GroundingSupport {
            segment: SegmentSpan {
                start_index,
                end_index,
                text: self.text.clone(),
            },
            grounding_chunk_indices: self.chunk_indices.clone(),
            confidence_scores: self.confidence_scores.clone(),
        }
    }
}

/// Anchored text span in the output wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSpan {
    pub start_index: i64,
    pub end_index: i64,
    pub text: String,
}

/// Grounding support in the output wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    pub segment: SegmentSpan,
    pub grounding_chunk_indices: Vec<usize>,
    pub confidence_scores: Vec<f64>,
}

/// The reconciled fact-check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verdict: Verdict,

    /// Model self-reported confidence, in [0, 1]
    pub confidence_score: f64,

    /// Sanitized, degree-normalized prose; all spans index into this text
    pub analysis: String,

    pub multimodal_cross_check: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_literacy: Option<MediaLiteracy>,

    pub grounding_citations: Vec<Citation>,

    pub scanned_sources: Vec<ScannedSource>,

    pub grounding_supports: Vec<GroundingSupport>,

    pub reliability_metrics: ReliabilityReport,
}

impl AnalysisResult {
    /// Canonical degraded result for a failed reconciliation.
    pub fn unverifiable(reason: &ReconcileError) -> Self {
        let detail = match reason {
            ReconcileError::NoJsonFound | ReconcileError::UnrepairableJson { .. } => {
                "The model returned malformed data or was blocked by safety filters."
            }
            ReconcileError::UpstreamTimeout(_) => "The analysis service did not respond in time.",
            ReconcileError::UpstreamTransport(_) => "The analysis service could not be reached.",
            ReconcileError::Validation(_) => {
                "The model response did not satisfy the result contract."
            }
        };

        Self {
            analysis: degraded_analysis(detail),
            reliability_metrics: ReliabilityReport::empty(format!(
                "Reliability could not be assessed ({} failure).",
                reason.stage()
            )),
            ..Self::default()
        }
    }

    /// Whether this is a degraded result rather than a reconciled one.
    pub fn is_degraded(&self) -> bool {
        self.verdict == Verdict::Unverifiable
            && self.confidence_score == 0.0
            && self.grounding_supports.is_empty()
            && self.analysis.starts_with(DEGRADED_HEADER)
    }
}

const DEGRADED_HEADER: &str = "**1. The Core Claim(s):**\nThe data could not be parsed.";

fn degraded_analysis(detail: &str) -> String {
    format!(
        "{}\n\n**2. Evidence Breakdown:**\n* {}",
        DEGRADED_HEADER, detail
    )
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            verdict: Verdict::Unverifiable,
            confidence_score: 0.0,
            analysis: degraded_analysis(
                "The model returned malformed data or was blocked by safety filters.",
            ),
            multimodal_cross_check: false,
            source_metadata: None,
            media_literacy: None,
            grounding_citations: Vec::new(),
            scanned_sources: Vec::new(),
            grounding_supports: Vec::new(),
            reliability_metrics: ReliabilityReport::empty(
                "Reliability could not be assessed.".to_string(),
            ),
        }
    }
}
