//! Property tests for resolution and its building blocks.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use proptest::prelude::*;

use knowlink::cache::VectorCache;
use knowlink::content::{Track, parse_markdown_path};
use knowlink::embedding::{Embedder, HashEmbedder, normalize_text};
use knowlink::search::{FusionConfig, FusionEngine, cosine_similarity};
use knowlink::test_utils::fixtures::{SAMPLE_JS_MARKDOWN, SAMPLE_PY_MARKDOWN, engine};

static ENGINE: LazyLock<FusionEngine> = LazyLock::new(|| {
    let engine = engine(Arc::new(HashEmbedder::new(64)), FusionConfig {
        lexical_weight: 0.7,
        semantic_weight: 0.5,
        quality_threshold: 0.3,
        max_results: 4,
    });
    for (track, markdown) in [
        (Track::JavaScript, SAMPLE_JS_MARKDOWN),
        (Track::Python, SAMPLE_PY_MARKDOWN),
    ] {
        engine
            .index_track(&parse_markdown_path(track, markdown))
            .expect("sample track indexes");
    }
    engine
});

fn arb_track() -> impl Strategy<Value = Option<Track>> {
    prop_oneof![
        Just(None),
        Just(Some(Track::JavaScript)),
        Just(Some(Track::Python)),
    ]
}

fn arb_query() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{0,60}",
        prop::sample::select(vec![
            "how do loops work",
            "what is a variable",
            "promise then catch",
            "python list slicing",
            "dict keys and items",
            "异步编程",
            "循环",
        ])
        .prop_map(str::to_string),
    ]
}

proptest! {
    #[test]
    fn resolve_is_deterministic(query in arb_query(), track in arb_track()) {
        let first = ENGINE.resolve(&query, track);
        let second = ENGINE.resolve(&query, track);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn resolve_respects_config(query in arb_query(), track in arb_track()) {
        let config = ENGINE.config();
        let candidates = ENGINE.resolve(&query, track);

        prop_assert!(candidates.len() <= config.max_results);
        for pair in candidates.windows(2) {
            prop_assert!(pair[0].fused_score >= pair[1].fused_score);
        }
        for candidate in &candidates {
            prop_assert!((0.0..=1.0).contains(&candidate.fused_score));
            prop_assert!(candidate.fused_score >= config.quality_threshold);
            if let Some(track) = track {
                if candidate.lexical_score.is_some() {
                    prop_assert_eq!(candidate.track, track);
                }
            }
        }
    }

    #[test]
    fn blank_queries_resolve_to_nothing(query in "[ \t\n]{0,12}", track in arb_track()) {
        prop_assert!(ENGINE.resolve(&query, track).is_empty());
    }

    #[test]
    fn cosine_is_bounded(
        pair in (1usize..32).prop_flat_map(|n| (
            prop::collection::vec(-100.0f32..100.0, n),
            prop::collection::vec(-100.0f32..100.0, n),
        ))
    ) {
        let (a, b) = pair;
        let similarity = cosine_similarity(&a, &b);
        prop_assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&similarity));
        prop_assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn normalization_is_idempotent(text in "[a-zA-Z0-9 \t\n\u{3000}\u{ff21}-\u{ff3a}]{0,80}", max in 1usize..100) {
        let once = normalize_text(&text, max);
        prop_assert_eq!(normalize_text(&once, max), once.clone());
        prop_assert!(once.chars().count() <= max);
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
    }

    #[test]
    fn hash_embeddings_are_unit_or_zero(text in ".{0,80}") {
        let embedder = HashEmbedder::new(32);
        let vector = embedder.embed(&text).unwrap();
        prop_assert_eq!(vector.len(), 32);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4);
        prop_assert_eq!(vector, embedder.embed(&text).unwrap());
    }

    #[test]
    fn cached_vectors_read_back(text in ".{1,40}", vector in prop::collection::vec(-1000.0f32..1000.0, 1..64)) {
        let cache = VectorCache::in_memory(Duration::from_secs(3600));
        cache.set(&text, &vector).unwrap();
        let stored = cache.get(&text).unwrap();
        prop_assert_eq!(stored.len(), vector.len());
        for (got, want) in stored.iter().zip(&vector) {
            prop_assert!((got - want).abs() <= want.abs() * 1e-6);
        }
    }
}
