//! The reconciliation pipeline.
//!
//! Composes extraction, sanitization, anchoring, citation building and
//! scoring. Each stage returns an explicit value or error; only
//! [`Pipeline::reconcile`] converts errors into the degraded result.

use tracing::{debug, info, warn};

use crate::anchor::AnchorReconciler;
use crate::authority::AuthorityTable;
use crate::config::{ConfigError, ReconcileConfig};
use crate::evidence::{build_citations, scanned_sources, EvidenceChunk};
use crate::extract::extract;
use crate::sanitize::sanitize;
use crate::schema::validate_result_schema;
use crate::scorer::Scorer;
use crate::types::{AnalysisResult, Segment, Verdict};
use crate::upstream::{GroundingMetadata, ModelOutput};
use crate::ReconcileError;

/// A configured, reusable reconciliation pipeline.
///
/// Holds only immutable configuration, so one instance can serve any
/// number of concurrent requests.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ReconcileConfig,
    scorer: Scorer,
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = ReconcileConfig::default();
        let scorer = Scorer::new(config.scoring.clone(), AuthorityTable::default());
        Self { config, scorer }
    }
}

impl Pipeline {
    /// Build a pipeline, validating the config and loading the authority table.
    pub fn new(config: ReconcileConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let authority = AuthorityTable::from_config(&config.authority)?;
        info!(
            verified_domains = authority.verified_count(),
            aggregation = ?config.scoring.aggregation,
            "Reconciliation pipeline configured"
        );
        let scorer = Scorer::new(config.scoring.clone(), authority);
        Ok(Self { config, scorer })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Leading characters of raw text, bounded for logging.
    pub fn excerpt(&self, text: &str) -> String {
        excerpt(text, self.config.excerpt_chars)
    }

    /// Reconcile, degrading every failure to the canonical result.
    pub fn reconcile(&self, output: &ModelOutput) -> AnalysisResult {
        match self.try_reconcile(output) {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    stage = err.stage(),
                    error = %err,
                    excerpt = %self.excerpt(&output.text),
                    "Reconciliation degraded to UNVERIFIABLE"
                );
                AnalysisResult::unverifiable(&err)
            }
        }
    }

    /// Reconcile, returning the first stage error.
    pub fn try_reconcile(&self, output: &ModelOutput) -> Result<AnalysisResult, ReconcileError> {
        let structured = extract(&output.text)?;

        let verdict = parse_verdict(structured.verdict.as_deref())?;
        let confidence_score = normalize_confidence(structured.confidence_score)?;

        let reconciler = AnchorReconciler::new(
            &sanitize(&structured.analysis),
            self.config.anchoring.clone(),
        );
        let chunks = output.grounding.evidence_chunks();
        let segments = self.reconcile_segments(&reconciler, &output.grounding, &chunks);

        let citations = build_citations(&chunks, &segments);
        let scanned = scanned_sources(&chunks, &citations);
        let report = self.scorer.score(
            &segments,
            &chunks,
            &citations,
            structured.multimodal_cross_check,
            confidence_score,
        );

        debug!(
            chunks = chunks.len(),
            segments = segments.len(),
            citations = citations.len(),
            score = report.score,
            "Reconciled model output"
        );

        let result = AnalysisResult {
            verdict,
            confidence_score,
            analysis: reconciler.into_text(),
            multimodal_cross_check: structured.multimodal_cross_check,
            source_metadata: structured.source_metadata,
            media_literacy: structured.media_literacy,
            grounding_citations: citations,
            scanned_sources: scanned,
            grounding_supports: segments.iter().map(Segment::to_support).collect(),
            reliability_metrics: report,
        };

        validate(&result)?;
        Ok(result)
    }

    /// Sanitize and anchor every upstream support, dropping empty ones.
    fn reconcile_segments(
        &self,
        reconciler: &AnchorReconciler,
        grounding: &GroundingMetadata,
        chunks: &[EvidenceChunk],
    ) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (i, support) in grounding.supports().iter().enumerate() {
            // Escaped line breaks must become real ones before the
            // sanitizer trims backslashes from the edges.
            let text = sanitize(&support.segment_text().replace("\\n", "\n"));
            if text.is_empty() {
                debug!(segment = i, "Dropping segment with no prose after sanitization");
                continue;
            }

            let anchor = reconciler.anchor(&text, support.claimed_span());
            if !anchor.is_anchored() {
                warn!(
                    segment = i,
                    excerpt = %excerpt(&anchor.text, 60),
                    "Segment could not be anchored"
                );
            }

            let scores = support.confidence_scores();
            let mut chunk_indices = Vec::new();
            let mut confidence_scores = Vec::new();
            for (pos, &raw) in support.chunk_indices().iter().enumerate() {
                match usize::try_from(raw).ok().filter(|&idx| idx < chunks.len()) {
                    Some(idx) => {
                        chunk_indices.push(idx);
                        confidence_scores.push(
                            scores
                                .get(pos)
                                .copied()
                                .filter(|c| c.is_finite())
                                .unwrap_or(self.config.scoring.missing_confidence),
                        );
                    }
                    None => {
                        debug!(segment = i, index = raw, "Ignoring out-of-range chunk index")
                    }
                }
            }

            segments.push(Segment {
                text: anchor.text,
                span: anchor.span,
                chunk_indices,
                confidence_scores,
                anchor: anchor.method,
            });
        }

        segments
    }
}

/// A missing or blank verdict is `UNVERIFIABLE`; an unrecognized one is an error.
fn parse_verdict(raw: Option<&str>) -> Result<Verdict, ReconcileError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        debug!("No verdict in model output, defaulting to UNVERIFIABLE");
        return Ok(Verdict::Unverifiable);
    };
    Verdict::parse(raw)
        .ok_or_else(|| ReconcileError::Validation(vec![format!("unknown verdict `{}`", raw)]))
}

/// Confidence in [0, 1]; values in (1, 100] are read as percentages.
fn normalize_confidence(raw: Option<f64>) -> Result<f64, ReconcileError> {
    let Some(value) = raw else {
        return Ok(0.0);
    };
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ReconcileError::Validation(vec![format!(
            "confidence_score out of range: {}",
            value
        )]));
    }
    Ok(if value > 1.0 { value / 100.0 } else { value })
}

fn validate(result: &AnalysisResult) -> Result<(), ReconcileError> {
    let value = serde_json::to_value(result)
        .map_err(|e| ReconcileError::Validation(vec![e.to_string()]))?;
    validate_result_schema(&value).map_err(ReconcileError::Validation)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
