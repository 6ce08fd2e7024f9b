//! Resolution scenarios through `FusionEngine::resolve`.

use std::sync::Arc;
use std::time::Duration;

use knowlink::LinkError;
use knowlink::content::Track;
use knowlink::embedding::{EmbeddingGateway, HashEmbedder};
use knowlink::search::{Confidence, FusionConfig, FusionConfigPatch, IndexEntry, MatchType};
use knowlink::test_utils::fixtures::{engine, learning_path};
use knowlink::test_utils::{KeywordEmbedder, SlowEmbedder, TestLogger, ZeroEmbedder};

use super::fixture::{all_of_type, engine_with_timeout, in_memory_cache, lexical_only};
use crate::assert_ids;

#[test]
fn question_resolves_to_the_matching_section() {
    let log = TestLogger::new("question_resolves_to_the_matching_section");
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("s1", "Variables"), ("s2", "Loops")],
        ))
        .unwrap();

    log.log_input("query", &"what is a variable");
    log.log_expected(&["s1 (lexical)"]);
    let candidates = engine.resolve("what is a variable", Some(Track::JavaScript));
    log.log_candidates(&candidates);

    assert_ids!(candidates, ["s1"]);
    let top = &candidates[0];
    assert_eq!(top.match_type, MatchType::Lexical);
    assert_eq!(top.confidence, Confidence::High);
    assert!((top.fused_score - 1.0).abs() < 1e-6);
    assert_eq!(top.semantic_score, None);
    assert_eq!(top.title, "Variables");
    assert_eq!(top.chapter_id, "ch1");
    assert!(top.matched_terms.contains(&"variable".to_string()));
    assert!(top.explanation.contains("lexical match on"));
    log.pass();
}

#[test]
fn both_signals_make_a_hybrid_candidate() {
    let engine = engine(
        Arc::new(KeywordEmbedder::new(&["promise", "loop"])),
        FusionConfig::default(),
    );
    engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("p", "Promise Basics"), ("l", "Loops")],
        ))
        .unwrap();

    let candidates = engine.resolve("promise", Some(Track::JavaScript));
    assert_ids!(candidates, ["p"]);
    let top = &candidates[0];
    assert_eq!(top.match_type, MatchType::Hybrid);
    assert!((top.fused_score - 1.0).abs() < 1e-6);
    assert_eq!(top.lexical_score, Some(1.0));
    assert!(top.semantic_score.is_some_and(|s| (s - 1.0).abs() < 1e-6));
    assert!(top.explanation.contains("semantic similarity 1.00"));
}

#[test]
fn lexical_match_alone_does_not_pass_default_threshold() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), FusionConfig::default());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("s1", "Variables")]))
        .unwrap();

    // 1.0 * 0.4 stays under 0.65
    assert!(engine.resolve("variables", None).is_empty());
}

#[test]
fn slow_backend_degrades_to_lexical_results() {
    let cache = in_memory_cache();
    let path = learning_path(Track::JavaScript, &[("s1", "Variables"), ("s2", "Loops")]);

    // Warm the cache so indexing never waits on the slow backend.
    let warm = EmbeddingGateway::new(Arc::new(HashEmbedder::new(64)), Arc::clone(&cache));
    let texts: Vec<String> = IndexEntry::from_path(&path)
        .iter()
        .map(IndexEntry::semantic_text)
        .collect();
    warm.embed_batch(&texts).unwrap();

    let engine = engine_with_timeout(
        Arc::new(SlowEmbedder::new(64, Duration::from_millis(500))),
        cache,
        Duration::from_millis(25),
        FusionConfig {
            lexical_weight: 1.0,
            ..FusionConfig::default()
        },
    );
    let report = engine.index_track(&path).unwrap();
    assert_eq!(report.semantic_vectors, 2);
    assert_eq!(report.semantic_skipped, 0);

    let candidates = engine.resolve("loops", Some(Track::JavaScript));
    assert_ids!(candidates, ["s2"]);
    assert!(all_of_type(&candidates, MatchType::Lexical));
}

#[test]
fn repeated_keywords_are_thinned_out() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("l1", "Loops"), ("l2", "Loops"), ("l3", "Loops"), ("l4", "Loops")],
        ))
        .unwrap();

    let candidates = engine.resolve("loops", None);
    assert_ids!(candidates, ["l1", "l2"]);
}

#[test]
fn max_results_caps_output() {
    let engine = engine(
        Arc::new(ZeroEmbedder::new(8)),
        FusionConfig {
            max_results: 1,
            ..lexical_only()
        },
    );
    engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("a", "Loops"), ("b", "For Loops")],
        ))
        .unwrap();

    assert_eq!(engine.resolve("loops", None).len(), 1);
}

#[test]
fn track_filter_limits_results() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("js-var", "Variables")]))
        .unwrap();
    engine
        .index_track(&learning_path(Track::Python, &[("py-var", "Variables")]))
        .unwrap();

    let python = engine.resolve("variables", Some(Track::Python));
    assert_ids!(python, ["py-var"]);
    assert_eq!(python[0].track, Track::Python);

    let everywhere = engine.resolve("variables", None);
    assert_eq!(everywhere.len(), 2);
}

#[test]
fn unindexed_track_yields_nothing() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(Track::Python, &[("py-var", "Variables")]))
        .unwrap();

    assert!(engine.resolve("variables", Some(Track::JavaScript)).is_empty());
}

#[test]
fn blank_query_yields_nothing() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("s1", "Variables")]))
        .unwrap();

    assert!(engine.resolve("", None).is_empty());
    assert!(engine.resolve("   \n\t", None).is_empty());
}

#[test]
fn invalid_weights_are_rejected_and_config_kept() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), FusionConfig::default());

    let err = engine
        .update_config(&FusionConfigPatch {
            lexical_weight: Some(-0.5),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, LinkError::InvalidConfig(_)));
    assert_eq!(engine.config(), FusionConfig::default());
}

#[test]
fn config_update_changes_ranking_immediately() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), FusionConfig::default());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("s1", "Variables")]))
        .unwrap();
    assert!(engine.resolve("variables", None).is_empty());

    engine
        .update_config(&FusionConfigPatch {
            lexical_weight: Some(1.0),
            ..Default::default()
        })
        .unwrap();
    assert_ids!(engine.resolve("variables", None), ["s1"]);
}

#[test]
fn related_sections_share_keywords() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("a", "Loops"), ("b", "For Loops"), ("c", "Variables")],
        ))
        .unwrap();

    let related = engine.related_sections("a", 5);
    assert_ids!(related, ["b"]);
    assert_eq!(related[0].explanation, "shares keywords: loop, loops");
    assert!(engine.related_sections("missing", 5).is_empty());
}
