//! Property tests for the reconciliation invariants.

use proptest::prelude::*;
use veriscan_core::{
    extract, reconcile, sanitize, slice_chars, AnchorPolicy, AnchorReconciler, AuthorityTable,
    EvidenceChunk, ModelOutput, Scorer, ScoringPolicy, Segment,
};

fn chunks(domains: usize) -> Vec<EvidenceChunk> {
    (0..domains)
        .map(|i| EvidenceChunk::new(i, format!("Source {}", i), format!("https://site{}.org/page", i)))
        .collect()
}

/// Text with a bias toward JSON punctuation and keys.
fn jsonish() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("\"".to_string()),
            Just(",".to_string()),
            Just("{".to_string()),
            Just("}".to_string()),
            Just("[".to_string()),
            Just("\n".to_string()),
            Just("\\".to_string()),
            Just("\"verdict\": ".to_string()),
            Just("\"analysis\": ".to_string()),
            Just("Note: ".to_string()),
            Just("```json".to_string()),
            "[a-zA-Z °é]{0,12}",
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(text in jsonish()) {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_is_idempotent_on_any_text(text in ".*") {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn extract_never_panics(text in ".*") {
        let _ = extract(&text);
    }

    #[test]
    fn extract_never_panics_on_jsonish(text in jsonish()) {
        let _ = extract(&text);
    }

    #[test]
    fn reconcile_is_total(text in jsonish()) {
        let result = reconcile(&ModelOutput::text(text));
        prop_assert!((0.0..=1.0).contains(&result.confidence_score));
        prop_assert!((0.0..=1.0).contains(&result.reliability_metrics.score));
    }

    #[test]
    fn score_is_bounded(
        confidences in prop::collection::vec(any::<f64>(), 0..12),
        multimodal in any::<bool>(),
    ) {
        let chunks = chunks(3);
        let segments: Vec<Segment> = confidences
            .iter()
            .enumerate()
            .map(|(i, &c)| Segment::new(format!("segment {}", i)).with_source(i % 3, c))
            .collect();

        let report = Scorer::default().score(&segments, &chunks, &[], multimodal, 0.5);

        prop_assert!((0.0..=1.0).contains(&report.score));
        prop_assert!((0.0..=1.0).contains(&report.base_grounding));
    }

    #[test]
    fn new_strong_domain_never_lowers_score(
        confidences in prop::collection::vec(0.0f64..=1.0, 1..8),
    ) {
        let chunks = chunks(4);
        let scorer = Scorer::new(ScoringPolicy::default(), AuthorityTable::default());
        let mut segments: Vec<Segment> = confidences
            .iter()
            .map(|&c| Segment::new("claim").with_source(0, c))
            .collect();
        let before = scorer.score(&segments, &chunks, &[], false, 0.0);

        segments.push(Segment::new("corroboration").with_source(1, 1.0));
        let after = scorer.score(&segments, &chunks, &[], false, 0.0);

        prop_assert!(after.base_grounding >= before.base_grounding - 1e-12);
        prop_assert_eq!(after.consistency_bonus, 0.05);

        segments.push(Segment::new("more").with_source(2, 1.0));
        let more = scorer.score(&segments, &chunks, &[], false, 0.0);
        prop_assert_eq!(more.consistency_bonus, after.consistency_bonus);
    }

    #[test]
    fn anchored_spans_slice_to_segment_text(
        analysis in "[a-zA-Z0-9 .,°é*\n-]{0,80}",
        start in 0usize..80,
        len in 0usize..40,
        noise in "[a-z ]{0,10}",
    ) {
        let reconciler = AnchorReconciler::new(&analysis, AnchorPolicy::default());
        let chars: Vec<char> = reconciler.text().chars().collect();
        let from = start.min(chars.len());
        let to = (from + len).min(chars.len());
        let mut segment: String = chars[from..to].iter().collect();
        segment.push_str(&noise);

        let anchor = reconciler.anchor(&segment, None);
        if let Some(span) = anchor.span {
            prop_assert_eq!(slice_chars(reconciler.text(), span), Some(anchor.text.as_str()));
        }
    }
}
