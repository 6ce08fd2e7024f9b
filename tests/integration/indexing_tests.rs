//! Loading learning paths and building both indexes.

use std::sync::Arc;
use std::time::Duration;

use knowlink::LinkError;
use knowlink::content::{Track, load_learning_path, parse_markdown_path};
use knowlink::embedding::HashEmbedder;
use knowlink::search::FusionConfig;
use knowlink::test_utils::fixtures::{
    SAMPLE_JS_MARKDOWN, SAMPLE_PY_MARKDOWN, UnitTestFixture, engine, learning_path,
};
use knowlink::test_utils::{FailingEmbedder, ZeroEmbedder};

use super::fixture::lexical_only;
use crate::assert_ids;

#[test]
fn sample_tracks_parse_and_index() {
    let engine = engine(Arc::new(HashEmbedder::new(64)), lexical_only());

    let js = parse_markdown_path(Track::JavaScript, SAMPLE_JS_MARKDOWN);
    assert_eq!(js.title, "JavaScript Basics");
    assert_eq!(js.chapters.len(), 3);
    assert_eq!(js.section_count(), 6);

    let py = parse_markdown_path(Track::Python, SAMPLE_PY_MARKDOWN);
    assert_eq!(py.chapters.len(), 2);
    assert_eq!(py.section_count(), 4);

    let js_report = engine.index_track(&js).unwrap();
    assert_eq!(js_report.sections, 6);
    assert_eq!(js_report.semantic_vectors, 6);
    engine.index_track(&py).unwrap();

    let stats = engine.stats();
    assert_eq!(stats.lexical_entries, 10);
    assert_eq!(stats.semantic_entries, 10);
    assert_eq!(stats.indexed_tracks, vec![Track::JavaScript, Track::Python]);
    assert_eq!(stats.cache_size, 10);

    let candidates = engine.resolve("promise", Some(Track::JavaScript));
    assert_eq!(candidates[0].section_id, "js-promise");
    assert_eq!(candidates[0].chapter_id, "js-async");
    assert_eq!(candidates[0].chapter_title, "Asynchronous JavaScript");
}

#[test]
fn track_file_on_disk_is_loaded() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_track("javascript", SAMPLE_JS_MARKDOWN);

    let loaded = load_learning_path(Track::JavaScript, &path).unwrap();
    assert_eq!(loaded.section_count(), 6);

    let first = loaded.sections().next().map(|(_, section)| section.clone()).unwrap();
    assert_eq!(first.id, "js-variables");
    assert_eq!(first.title, "Variables and Constants");
    assert_eq!(first.preview.as_deref(), Some("Declare values with let and const."));
}

#[test]
fn json_track_with_wrong_track_is_rejected() {
    let fixture = UnitTestFixture::new();
    let py = learning_path(Track::Python, &[("py-var", "Variables")]);
    let path = fixture.create_file(
        "tracks/python.json",
        &serde_json::to_string(&py).unwrap(),
    );

    assert_eq!(load_learning_path(Track::Python, &path).unwrap(), py);
    assert!(matches!(
        load_learning_path(Track::JavaScript, &path),
        Err(LinkError::ContentParse(_))
    ));
}

#[test]
fn section_ids_must_be_unique_across_tracks() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("shared", "Loops")]))
        .unwrap();

    let err = engine
        .index_track(&learning_path(Track::Python, &[("shared", "Loops")]))
        .unwrap_err();
    match err {
        LinkError::DuplicateSection {
            section_id,
            existing,
            incoming,
        } => {
            assert_eq!(section_id, "shared");
            assert_eq!(existing, Track::JavaScript);
            assert_eq!(incoming, Track::Python);
        }
        other => panic!("expected DuplicateSection, got {other:?}"),
    }
    assert!(!engine.is_ready(Track::Python));
}

#[test]
fn section_ids_must_be_unique_within_a_track() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    let err = engine
        .index_track(&learning_path(
            Track::JavaScript,
            &[("twice", "Loops"), ("twice", "Variables")],
        ))
        .unwrap_err();
    assert!(matches!(err, LinkError::DuplicateSection { .. }));
}

#[test]
fn rebuilding_a_track_is_idempotent() {
    let engine = engine(Arc::new(HashEmbedder::new(64)), lexical_only());
    let path = parse_markdown_path(Track::JavaScript, SAMPLE_JS_MARKDOWN);

    let first = engine.index_track(&path).unwrap();
    let before = engine.resolve("loops", None);
    let second = engine.index_track(&path).unwrap();
    let after = engine.resolve("loops", None);

    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(engine.stats().lexical_entries, 6);
}

#[test]
fn rebuilding_replaces_old_sections() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), lexical_only());
    engine
        .index_track(&learning_path(Track::JavaScript, &[("old", "Loops")]))
        .unwrap();
    engine
        .index_track(&learning_path(Track::JavaScript, &[("new", "Loops")]))
        .unwrap();

    assert_ids!(engine.resolve("loops", None), ["new"]);
    assert!(engine.section("old").is_none());
}

#[test]
fn failing_backend_still_builds_lexical_index() {
    let engine = engine(Arc::new(FailingEmbedder::new(8)), lexical_only());
    let report = engine
        .index_track(&learning_path(Track::JavaScript, &[("s1", "Variables")]))
        .unwrap();

    assert_eq!(report.semantic_vectors, 0);
    assert_eq!(report.semantic_skipped, 1);
    assert!(engine.is_ready(Track::JavaScript));
    assert_ids!(engine.resolve("variables", None), ["s1"]);
}

#[test]
fn waiters_wake_when_track_is_indexed() {
    let engine = engine(Arc::new(ZeroEmbedder::new(8)), FusionConfig::default());
    assert!(!engine.wait_until_ready(Track::Python, Duration::from_millis(20)));

    std::thread::scope(|scope| {
        let waiter = scope.spawn(|| engine.wait_until_ready(Track::JavaScript, Duration::from_secs(10)));
        std::thread::sleep(Duration::from_millis(20));
        engine
            .index_track(&learning_path(Track::JavaScript, &[("s1", "Loops")]))
            .unwrap();
        assert!(waiter.join().unwrap());
    });
    assert!(engine.is_ready(Track::JavaScript));
    assert!(!engine.is_ready(Track::Python));
}
