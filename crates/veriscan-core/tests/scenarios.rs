//! End-to-end reconciliation scenarios.

use serde_json::json;
use veriscan_core::{
    extract, reconcile, sanitize, slice_chars, AnchorMethod, AnchorPolicy, AnchorReconciler,
    AuthorityTable, EvidenceChunk, ModelOutput, Pipeline, ReconcileConfig, ReliabilityLabel,
    Scorer, ScoringPolicy, Segment, Span, Verdict,
};

#[test]
fn trailing_comma_object_extracts() {
    let raw = r#"{"verdict":"TRUE","analysis":"Water boils at 100°C,","confidence_score":0.9,}"#;
    let out = extract(raw).unwrap();

    assert_eq!(out.verdict.as_deref(), Some("TRUE"));
    assert_eq!(out.confidence_score, Some(0.9));
    assert_eq!(out.analysis, "Water boils at 100°C,");
}

#[test]
fn leaked_json_fragment_sanitized() {
    let input = "\",\n\"multimodal_cross_check\": false,\n\"key_findings\": [\n\"The wall is visible";
    assert_eq!(sanitize(input), "The wall is visible");
}

#[test]
fn verbatim_segment_anchors_exactly() {
    let analysis = "Cold brew needs steeping. Most recipes suggest 30-40 minutes for hot tea.";
    let reconciler = AnchorReconciler::new(analysis, AnchorPolicy::default());
    let anchor = reconciler.anchor("30-40 minutes", None);

    let expected_start = analysis.find("30-40").unwrap();
    assert_eq!(anchor.method, AnchorMethod::Exact);
    assert_eq!(anchor.span, Some(Span::new(expected_start, expected_start + 13)));
}

#[test]
fn reworded_segment_anchors_by_fingerprint() {
    let analysis = "Our finding: the Great Wall of China is not visible to the naked eye from orbit.";
    let reconciler = AnchorReconciler::new(analysis, AnchorPolicy::default());
    let segment = "the Great Wall of China cannot be seen from orbit";
    let anchor = reconciler.anchor(segment, None);

    assert_eq!(anchor.method, AnchorMethod::Fingerprint);
    let span = anchor.span.unwrap();
    assert_eq!(span.start, 13);
    assert_eq!(slice_chars(reconciler.text(), span), Some(anchor.text.as_str()));
}

#[test]
fn two_domain_grounding_scores_medium_high() {
    let chunks = vec![
        EvidenceChunk::new(0, "NASA", "https://www.nasa.gov/wall"),
        EvidenceChunk::new(1, "Snopes", "https://www.snopes.com/fact-check/wall"),
    ];
    let segments = vec![
        Segment::new("one").with_source(0, 0.6),
        Segment::new("two").with_source(1, 0.6),
        Segment::new("three").with_source(0, 0.6),
    ];
    let scorer = Scorer::new(ScoringPolicy::default(), AuthorityTable::new(1.0, 1.0));
    let report = scorer.score(&segments, &chunks, &[], false, 0.8);

    assert!((report.base_grounding - 0.60).abs() < 1e-9);
    assert!((report.score - 0.65).abs() < 1e-9);
    assert_eq!(report.label, ReliabilityLabel::MediumHigh);
}

#[test]
fn unparsable_output_degrades() {
    let result = reconcile(&ModelOutput::text("not json at all"));

    assert_eq!(result.verdict, Verdict::Unverifiable);
    assert_eq!(result.confidence_score, 0.0);
    assert!(result.grounding_citations.is_empty());
    assert!(result.is_degraded());
}

#[test]
fn full_grounded_response() {
    let text = r#"Sure! Here is the analysis:
```json
{
  "verdict": "FALSE",
  "confidence_score": 0.92,
  "analysis": "**1. The Core Claim(s):**\nThe Great Wall is visible from the Moon.\n\n**2. Evidence Breakdown:**\n* Astronauts report it is not visible from the Moon.\n* Even from low orbit it is hard to see at 10&deg; sun angles.",
  "multimodal_cross_check": false,
  "source_metadata": {"type": "text"},
  "media_literacy": {"logical_fallacies": ["appeal to popularity"], "tone_analysis": "neutral"},
}
```"#;
    let output = ModelOutput::text(text).with_grounding(
        serde_json::from_value(json!({
            "groundingChunks": [
                {"web": {"uri": "https://www.nasa.gov/great-wall", "title": "nasa.gov"}},
                {"web": {"uri": "https://vertexaisearch.cloud.google.com/grounding-api-redirect/x", "title": "snopes.com"}},
                {"web": {"uri": "https://nasa.gov/great-wall/", "title": "NASA duplicate"}}
            ],
            "groundingSupports": [
                {"segment": {"startIndex": 5, "endIndex": 60, "text": "* Astronauts report it is not visible from the Moon."},
                 "groundingChunkIndices": [0, 2], "confidenceScores": [0.95, 0.9]},
                {"segment": {"text": "Even from low orbit it is hard to see at 10° sun angles."},
                 "groundingChunkIndices": [1], "confidenceScores": [0.8]}
            ]
        }))
        .unwrap(),
    );

    let result = reconcile(&output);

    assert_eq!(result.verdict, Verdict::False);
    assert_eq!(result.confidence_score, 0.92);
    assert!(result.analysis.contains("10° sun angles"));
    assert_eq!(result.media_literacy.unwrap().tone_analysis, "neutral");

    assert_eq!(result.grounding_citations.len(), 2);
    assert_eq!(result.grounding_citations[0].id, 1);
    assert_eq!(result.grounding_citations[1].id, 2);
    assert!(result.scanned_sources.iter().all(|s| s.is_cited));

    for support in &result.grounding_supports {
        assert!(support.segment.start_index >= 0);
        let span = Span::new(
            support.segment.start_index as usize,
            support.segment.end_index as usize,
        );
        assert_eq!(slice_chars(&result.analysis, span), Some(support.segment.text.as_str()));
    }

    let report = &result.reliability_metrics;
    assert_eq!(report.consistency_bonus, 0.05);
    assert_eq!(report.segment_audits[1].top_source_domain.as_deref(), Some("snopes.com"));
    assert!(report.unused_sources.is_empty());
}

#[test]
fn verified_domains_raise_authority() {
    let config = ReconcileConfig::from_yaml(
        "authority:\n  verified_domains: [nasa.gov]\n  default_authority: 0.5\n",
    )
    .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let output = ModelOutput::text(
        r#"{"verdict": "TRUE", "confidence_score": 1, "analysis": "The Moon has no atmosphere to speak of."}"#,
    )
    .with_grounding(
        serde_json::from_value(json!({
            "groundingChunks": [{"web": {"uri": "https://science.nasa.gov/moon", "title": "NASA"}}],
            "groundingSupports": [{"segment": {"text": "The Moon has no atmosphere"},
                "groundingChunkIndices": [0], "confidenceScores": [0.9]}]
        }))
        .unwrap(),
    );

    let result = pipeline.reconcile(&output);
    let source = &result.reliability_metrics.segment_audits[0].sources[0];

    assert!(source.is_verified);
    assert_eq!(source.authority, 1.0);
    assert!((result.reliability_metrics.base_grounding - 0.9).abs() < 1e-9);
}
