//! Vector cache behavior seen through the embedding gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use knowlink::cache::{CachedVector, KvStore, MemoryStore, SqliteStore, VectorCache, content_hash};
use knowlink::embedding::EmbeddingGateway;
use knowlink::test_utils::CountingEmbedder;
use knowlink::test_utils::fixtures::UnitTestFixture;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[test]
fn vectors_survive_reopening_the_store() {
    let fixture = UnitTestFixture::new();
    let db = fixture.data_path.join("cache/vectors.db");

    {
        let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&db, None).unwrap());
        let cache = Arc::new(VectorCache::new(store, Duration::from_secs(3600)));
        let counter = Arc::new(CountingEmbedder::new(16));
        let gateway = EmbeddingGateway::new(counter.clone(), cache);
        gateway.embed("closures capture their scope").unwrap();
        assert_eq!(counter.calls(), 1);
    }

    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&db, None).unwrap());
    let cache = Arc::new(VectorCache::new(store, Duration::from_secs(3600)));
    let counter = Arc::new(CountingEmbedder::new(16));
    let gateway = EmbeddingGateway::new(counter.clone(), cache);
    gateway.embed("closures capture their scope").unwrap();
    assert_eq!(counter.calls(), 0);
}

#[test]
fn expired_vector_is_regenerated() {
    let cache = Arc::new(VectorCache::in_memory(Duration::from_secs(7 * 24 * 3600)));
    let counter = Arc::new(CountingEmbedder::new(16));
    let gateway = EmbeddingGateway::new(counter.clone(), Arc::clone(&cache));

    let hash = content_hash(&gateway.normalize("event loop"));
    let stale = Utc::now().timestamp_millis() - 8 * DAY_MS;
    cache
        .put(&CachedVector {
            hash: hash.clone(),
            vector: vec![0.0; 16],
            created_at: stale,
        })
        .unwrap();

    let vector = gateway.embed("event loop").unwrap();
    assert_eq!(counter.calls(), 1);
    assert_ne!(vector, vec![0.0; 16]);

    let refreshed = cache.entry(&hash).unwrap();
    assert!(refreshed.created_at > stale);
    assert_eq!(refreshed.vector, vector);
}

#[test]
fn fresh_vector_is_reused_without_backend_call() {
    let cache = Arc::new(VectorCache::in_memory(Duration::from_secs(7 * 24 * 3600)));
    let counter = Arc::new(CountingEmbedder::new(4));
    let gateway = EmbeddingGateway::new(counter.clone(), Arc::clone(&cache));

    let hash = content_hash(&gateway.normalize("event loop"));
    cache
        .put(&CachedVector {
            hash,
            vector: vec![0.5; 4],
            created_at: Utc::now().timestamp_millis() - 6 * DAY_MS,
        })
        .unwrap();

    assert_eq!(gateway.embed("event loop").unwrap(), vec![0.5; 4]);
    assert_eq!(counter.calls(), 0);
}

#[test]
fn full_store_is_cleared_to_fit_new_vector() {
    // Two entries of four dims fit, a third does not.
    let cache = VectorCache::new(Arc::new(MemoryStore::with_quota(300)), Duration::from_secs(3600));
    let v = [1.0f32, 0.0, 0.0, 0.0];

    cache.set("first", &v).unwrap();
    cache.set("second", &v).unwrap();
    assert_eq!(cache.size(), 2);

    cache.set("third", &v).unwrap();
    assert_eq!(cache.size(), 1);
    assert!(cache.get("first").is_none());
    assert_eq!(cache.get("third"), Some(v.to_vec()));
}

#[test]
fn gateway_keeps_working_when_cache_cannot_store() {
    let cache = Arc::new(VectorCache::new(
        Arc::new(MemoryStore::with_quota(8)),
        Duration::from_secs(3600),
    ));
    let counter = Arc::new(CountingEmbedder::new(16));
    let gateway = EmbeddingGateway::new(counter.clone(), cache);

    assert_eq!(gateway.embed("generators").unwrap().len(), 16);
    assert_eq!(gateway.embed("generators").unwrap().len(), 16);
    assert_eq!(counter.calls(), 2);
}
