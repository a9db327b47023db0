//! # veriscan-core
//!
//! Deterministic reconciliation of fact-check model output with search grounding.
//!
//! This crate turns the raw, occasionally malformed text returned by a
//! grounded LLM call into a verified, internally consistent result:
//! - a parsed verdict and confidence
//! - a sanitized prose analysis
//! - citations anchored to exact character spans inside that prose
//! - one aggregate reliability score with a readable justification
//!
//! ## Key Guarantees
//!
//! 1. **Total**: [`reconcile`] never panics and never returns an error; every
//!    failure becomes the canonical `UNVERIFIABLE` result
//! 2. **Deterministic**: same model output always produces the same result
//! 3. **No I/O**: the pipeline makes no network calls
//! 4. **Request-scoped**: no state is shared between calls
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──► extract ──► sanitize ──► anchor ──► score ──► AnalysisResult
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use veriscan_core::{reconcile, ModelOutput, Verdict};
//!
//! let output = ModelOutput::text(r#"{"verdict":"TRUE","analysis":"Water boils at 100°C.","confidence_score":0.9}"#);
//! let result = reconcile(&output);
//!
//! assert_eq!(result.verdict, Verdict::True);
//! println!("{}", result.reliability_metrics.explanation);
//! ```

pub mod anchor;
pub mod authority;
pub mod config;
pub mod evidence;
pub mod extract;
pub mod pipeline;
pub mod sanitize;
pub mod schema;
pub mod scorer;
pub mod types;
pub mod upstream;

// Re-export main types at crate root
pub use anchor::{slice_chars, Anchor, AnchorMethod, AnchorReconciler, Span};
pub use authority::{AuthorityTable, SourceTier};
pub use config::{
    AnchorPolicy, AuthorityConfig, ConfigError, ReconcileConfig, ScoringPolicy, SegmentAggregation,
};
pub use evidence::{
    build_citations, normalize_domain, normalize_url, scanned_sources, source_domain, Citation,
    EvidenceChunk, LinkStatus, ScannedSource,
};
pub use extract::{extract, extract_bytes, ExtractionError, StructuredOutput};
pub use pipeline::Pipeline;
pub use sanitize::sanitize;
pub use scorer::{
    ReliabilityLabel, ReliabilityReport, Scorer, SegmentAudit, SourceAudit, UnusedSource,
};
pub use types::{
    AnalysisResult, GroundingSupport, InputKind, MediaLiteracy, Segment, SegmentSpan,
    SourceMetadata, Verdict,
};
pub use upstream::{GroundingMetadata, ModelOutput};

use std::time::Duration;
use thiserror::Error;

/// Errors that can end a reconciliation.
///
/// None of these escape [`reconcile`]; they are converted into the canonical
/// degraded result by [`AnalysisResult::unverifiable`]. A segment that cannot
/// be anchored is not an error: it is kept with [`AnchorMethod::Unanchored`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("No JSON object found in model output")]
    NoJsonFound,

    #[error("Model output JSON could not be repaired: {reason}")]
    UnrepairableJson { excerpt: String, reason: String },

    #[error("Upstream model timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("Result failed validation: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl ReconcileError {
    /// Pipeline stage that produced the error, for logs and forensic dumps.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoJsonFound | Self::UnrepairableJson { .. } => "extract",
            Self::UpstreamTimeout(_) | Self::UpstreamTransport(_) => "upstream",
            Self::Validation(_) => "validate",
        }
    }
}

impl From<ExtractionError> for ReconcileError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::NoJsonFound => Self::NoJsonFound,
            ExtractionError::UnrepairableJson { excerpt, reason } => {
                Self::UnrepairableJson { excerpt, reason }
            }
        }
    }
}

/// Reconcile a model output with the default configuration.
///
/// This is the main entry point. It never fails: any extraction or
/// validation problem yields the canonical `UNVERIFIABLE` result.
pub fn reconcile(output: &ModelOutput) -> AnalysisResult {
    Pipeline::default().reconcile(output)
}

/// Reconcile a model output, surfacing the error instead of degrading.
pub fn try_reconcile(output: &ModelOutput) -> Result<AnalysisResult, ReconcileError> {
    Pipeline::default().try_reconcile(output)
}
