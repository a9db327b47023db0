//! Reliability scoring: aggregates grounding evidence into one score.
//!
//! The scorer applies fixed rules over configurable constants:
//! 1. Source strength = clamped confidence × domain authority
//! 2. Segment contribution = max (or mean) of its source strengths
//! 3. Base grounding = mean contribution over segments
//! 4. Consistency bonus once if sources span more than one domain
//! 5. Multimodal bonus if the model verified uploaded content
//! 6. Final score clamped to [0, 1] and labelled by inclusive thresholds
//!
//! Every number in the report is explained by the `explanation` string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::authority::AuthorityTable;
use crate::config::ScoringPolicy;
use crate::evidence::{Citation, EvidenceChunk, UNKNOWN_DOMAIN};
use crate::types::Segment;

/// Tolerance applied to label thresholds.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Reliability label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReliabilityLabel {
    High,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    Medium,
    Low,
}

impl ReliabilityLabel {
    pub fn from_score(score: f64, policy: &ScoringPolicy) -> Self {
        if score + THRESHOLD_EPSILON >= policy.high_threshold {
            Self::High
        } else if score + THRESHOLD_EPSILON >= policy.medium_high_threshold {
            Self::MediumHigh
        } else if score + THRESHOLD_EPSILON >= policy.medium_threshold {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Contribution of one source to one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAudit {
    pub id: usize,
    pub chunk_index: usize,
    pub domain: String,
    pub confidence: f64,
    pub authority: f64,
    pub score: f64,
    pub is_verified: bool,
}

/// Per-segment scoring trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAudit {
    pub text: String,
    pub anchored: bool,
    pub top_source_domain: Option<String>,
    pub top_source_score: f64,
    pub sources: Vec<SourceAudit>,
}

/// A source no segment referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusedSource {
    pub id: usize,
    pub title: String,
    pub url: String,
    pub domain: String,
}

/// The reliability report attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityReport {
    #[serde(rename = "reliability_score")]
    pub score: f64,

    pub ai_confidence: f64,

    pub base_grounding: f64,

    pub consistency_bonus: f64,

    pub multimodal_bonus: f64,

    #[serde(rename = "verdict_label")]
    pub label: ReliabilityLabel,

    pub explanation: String,

    #[serde(rename = "segments", default)]
    pub segment_audits: Vec<SegmentAudit>,

    #[serde(default)]
    pub unused_sources: Vec<UnusedSource>,
}

impl ReliabilityReport {
    /// All-zero report used by degraded results.
    pub fn empty(explanation: String) -> Self {
        Self {
            score: 0.0,
            ai_confidence: 0.0,
            base_grounding: 0.0,
            consistency_bonus: 0.0,
            multimodal_bonus: 0.0,
            label: ReliabilityLabel::Low,
            explanation,
            segment_audits: Vec::new(),
            unused_sources: Vec::new(),
        }
    }
}

/// The Scorer turns segments and evidence into a reliability report.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    policy: ScoringPolicy,
    authority: AuthorityTable,
}

impl Scorer {
    pub fn new(policy: ScoringPolicy, authority: AuthorityTable) -> Self {
        Self { policy, authority }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score a reconciled result.
    ///
    /// # Arguments
    ///
    /// * `segments` - Reconciled segments; indices outside `chunks` are skipped
    /// * `chunks` - All evidence chunks, in upstream order
    /// * `citations` - Citations built from the segments
    /// * `multimodal_verified` - Whether uploaded content was cross-checked
    /// * `ai_confidence` - Model self-reported confidence, reported as-is
    pub fn score(
        &self,
        segments: &[Segment],
        chunks: &[EvidenceChunk],
        citations: &[Citation],
        multimodal_verified: bool,
        ai_confidence: f64,
    ) -> ReliabilityReport {
        let mut domains = BTreeSet::new();
        let mut referenced = BTreeSet::new();
        let mut audits = Vec::with_capacity(segments.len());
        let mut contributions = Vec::with_capacity(segments.len());

        for segment in segments {
            let mut sources = Vec::new();

            for (pos, &chunk_index) in segment.chunk_indices.iter().enumerate() {
                let Some(chunk) = chunks.get(chunk_index) else {
                    continue;
                };
                referenced.insert(chunk_index);

                let domain = chunk.domain();
                let confidence = clamp_unit(
                    segment
                        .confidence_scores
                        .get(pos)
                        .copied()
                        .unwrap_or(self.policy.missing_confidence),
                );
                let tier = self.authority.lookup(&domain);

                if domain != UNKNOWN_DOMAIN {
                    domains.insert(domain.clone());
                }
                sources.push(SourceAudit {
                    id: chunk.id(),
                    chunk_index,
                    domain,
                    confidence,
                    authority: tier.authority,
                    score: confidence * tier.authority,
                    is_verified: tier.is_verified,
                });
            }

            let contribution = self
                .policy
                .aggregation
                .combine(sources.iter().map(|s| s.score));
            contributions.push(contribution);

            let top = sources
                .iter()
                .reduce(|best, s| if s.score > best.score { s } else { best });
            audits.push(SegmentAudit {
                text: segment.text.clone(),
                anchored: segment.is_anchored(),
                top_source_domain: top.map(|s| s.domain.clone()),
                top_source_score: top.map_or(0.0, |s| s.score),
                sources,
            });
        }

        let base_grounding = if contributions.is_empty() {
            0.0
        } else {
            clamp_unit(contributions.iter().sum::<f64>() / contributions.len() as f64)
        };
        let consistency_bonus = if domains.len() > 1 {
            self.policy.consistency_bonus
        } else {
            0.0
        };
        let multimodal_bonus = if multimodal_verified {
            self.policy.multimodal_bonus
        } else {
            0.0
        };

        let score = clamp_unit(base_grounding + consistency_bonus + multimodal_bonus);

        let unused_sources = chunks
            .iter()
            .filter(|c| !referenced.contains(&c.index))
            .map(|c| UnusedSource {
                id: c.id(),
                title: c.display_title(),
                url: c.url.clone(),
                domain: c.domain(),
            })
            .collect();

        ReliabilityReport {
            score,
            ai_confidence: clamp_unit(ai_confidence),
            base_grounding,
            consistency_bonus,
            multimodal_bonus,
            label: ReliabilityLabel::from_score(score, &self.policy),
            explanation: explain(
                base_grounding,
                segments.len(),
                citations.len(),
                domains.len(),
                consistency_bonus,
                multimodal_bonus,
            ),
            segment_audits: audits,
            unused_sources,
        }
    }
}

/// Clamp into [0, 1]; NaN becomes 0.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn explain(
    base: f64,
    segment_count: usize,
    citation_count: usize,
    domain_count: usize,
    consistency_bonus: f64,
    multimodal_bonus: f64,
) -> String {
    let mut text = if segment_count == 0 {
        "No grounded segments were found, so base grounding is 0.00.".to_string()
    } else {
        format!(
            "Base grounding evaluated at {:.2} across {} segment{} citing {} source{}.",
            base,
            segment_count,
            if segment_count == 1 { "" } else { "s" },
            citation_count,
            if citation_count == 1 { "" } else { "s" },
        )
    };

    if consistency_bonus > 0.0 {
        text.push_str(&format!(
            " Consistency bonus (+{:.2}) applied for {} unique domains.",
            consistency_bonus, domain_count
        ));
    }
    if multimodal_bonus > 0.0 {
        text.push_str(&format!(
            " Multimodal bonus (+{:.2}) applied for cross-checked uploaded content.",
            multimodal_bonus
        ));
    }
    if consistency_bonus == 0.0 && multimodal_bonus == 0.0 {
        text.push_str(" No bonuses applied.");
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentAggregation;

    fn chunks() -> Vec<EvidenceChunk> {
        vec![
            EvidenceChunk::new(0, "Healthline", "https://www.healthline.com/lemon"),
            EvidenceChunk::new(1, "Mayo Clinic", "https://www.mayoclinic.org/water"),
            EvidenceChunk::new(2, "Unused", "https://unused.example.org"),
        ]
    }

    fn scorer() -> Scorer {
        Scorer::new(ScoringPolicy::default(), AuthorityTable::new(1.0, 1.0))
    }

    #[test]
    fn test_two_domains_consistency_bonus() {
        let segments = vec![
            Segment::new("a").with_source(0, 0.6),
            Segment::new("b").with_source(1, 0.6),
            Segment::new("c").with_source(0, 0.6),
        ];
        let report = scorer().score(&segments, &chunks(), &[], false, 0.9);

        assert!((report.base_grounding - 0.60).abs() < 1e-9);
        assert_eq!(report.consistency_bonus, 0.05);
        assert!((report.score - 0.65).abs() < 1e-9);
        assert_eq!(report.label, ReliabilityLabel::MediumHigh);
        assert!(report.explanation.contains("0.60 across 3 segments"));
        assert!(report.explanation.contains("2 unique domains"));
    }

    #[test]
    fn test_no_segments() {
        let report = scorer().score(&[], &chunks(), &[], false, 0.5);

        assert_eq!(report.base_grounding, 0.0);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.label, ReliabilityLabel::Low);
        assert_eq!(report.unused_sources.len(), 3);
        assert!(report.explanation.contains("No bonuses applied"));
    }

    #[test]
    fn test_max_versus_mean() {
        let segments = vec![Segment::new("a").with_source(0, 0.9).with_source(1, 0.3)];

        let max = scorer().score(&segments, &chunks(), &[], false, 0.0);
        assert!((max.base_grounding - 0.9).abs() < 1e-9);

        let policy = ScoringPolicy {
            aggregation: SegmentAggregation::Mean,
            ..ScoringPolicy::default()
        };
        let mean = Scorer::new(policy, AuthorityTable::new(1.0, 1.0))
            .score(&segments, &chunks(), &[], false, 0.0);
        assert!((mean.base_grounding - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_authority_weighting() {
        let table = AuthorityTable::default().with_verified(["mayoclinic.org"]);
        let scorer = Scorer::new(ScoringPolicy::default(), table);
        let segments = vec![Segment::new("a").with_source(0, 1.0).with_source(1, 1.0)];

        let report = scorer.score(&segments, &chunks(), &[], false, 0.0);
        let audit = &report.segment_audits[0];

        assert_eq!(audit.sources[0].score, 0.8);
        assert_eq!(audit.sources[1].score, 1.0);
        assert!(audit.sources[1].is_verified);
        assert_eq!(audit.top_source_domain.as_deref(), Some("mayoclinic.org"));
    }

    #[test]
    fn test_missing_and_invalid_confidences() {
        let mut segment = Segment::new("a").with_source(0, f64::NAN);
        segment.chunk_indices.push(1);

        let report = scorer().score(&[segment], &chunks(), &[], false, 0.0);
        let sources = &report.segment_audits[0].sources;

        assert_eq!(sources[0].confidence, 0.0);
        assert_eq!(sources[1].confidence, 0.5);
    }

    #[test]
    fn test_out_of_range_index_contributes_nothing() {
        let segments = vec![Segment::new("a").with_source(42, 1.0)];
        let report = scorer().score(&segments, &chunks(), &[], false, 0.0);

        assert_eq!(report.base_grounding, 0.0);
        assert!(report.segment_audits[0].sources.is_empty());
        assert!(report.segment_audits[0].top_source_domain.is_none());
    }

    #[test]
    fn test_bonuses_clamped() {
        let segments = vec![
            Segment::new("a").with_source(0, 1.0),
            Segment::new("b").with_source(1, 1.0),
        ];
        let report = scorer().score(&segments, &chunks(), &[], true, 2.0);

        assert_eq!(report.score, 1.0);
        assert_eq!(report.ai_confidence, 1.0);
        assert_eq!(report.label, ReliabilityLabel::High);
        assert!(report.explanation.contains("Multimodal bonus"));
    }

    #[test]
    fn test_label_thresholds_inclusive() {
        let policy = ScoringPolicy::default();
        assert_eq!(ReliabilityLabel::from_score(0.85, &policy), ReliabilityLabel::High);
        assert_eq!(ReliabilityLabel::from_score(0.65, &policy), ReliabilityLabel::MediumHigh);
        assert_eq!(ReliabilityLabel::from_score(0.6499, &policy), ReliabilityLabel::Medium);
        assert_eq!(ReliabilityLabel::from_score(0.40, &policy), ReliabilityLabel::Medium);
        assert_eq!(ReliabilityLabel::from_score(0.39, &policy), ReliabilityLabel::Low);
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(
            serde_json::to_string(&ReliabilityLabel::MediumHigh).unwrap(),
            "\"Medium-High\""
        );
        let report = ReliabilityReport::empty("x".to_string());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict_label"], "Low");
        assert!(json.get("reliability_score").is_some());
    }
}
