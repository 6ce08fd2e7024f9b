use std::sync::Arc;
use std::time::Duration;

use knowlink::cache::{DEFAULT_TTL, VectorCache};
use knowlink::embedding::{Embedder, EmbeddingGateway};
use knowlink::search::{Candidate, FusionConfig, FusionEngine, MatchType};

/// Assert the candidate ids, in rank order.
#[macro_export]
macro_rules! assert_ids {
    ($candidates:expr, [$($id:expr),* $(,)?]) => {{
        let candidates = &$candidates;
        let actual: Vec<&str> = candidates.iter().map(|c| c.section_id.as_str()).collect();
        let expected: Vec<&str> = vec![$($id),*];
        assert_eq!(actual, expected, "candidate ids differ");
    }};
}

/// Fusion settings that let a lexical match pass on its own.
pub fn lexical_only() -> FusionConfig {
    FusionConfig {
        lexical_weight: 1.0,
        semantic_weight: 0.0,
        ..FusionConfig::default()
    }
}

/// Engine whose gateway gives up on the backend after `timeout`.
pub fn engine_with_timeout(
    embedder: Arc<dyn Embedder>,
    cache: Arc<VectorCache>,
    timeout: Duration,
    config: FusionConfig,
) -> FusionEngine {
    let gateway = EmbeddingGateway::new(embedder, cache).with_timeout(Some(timeout));
    FusionEngine::new(Arc::new(gateway), config).expect("valid fusion config")
}

pub fn in_memory_cache() -> Arc<VectorCache> {
    Arc::new(VectorCache::in_memory(DEFAULT_TTL))
}

pub fn all_of_type(candidates: &[Candidate], match_type: MatchType) -> bool {
    candidates.iter().all(|c| c.match_type == match_type)
}
