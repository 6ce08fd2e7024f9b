//! Cached, normalized access to an embedding backend

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::cache::{VectorCache, content_hash};
use crate::embedding::backends::Embedder;
use crate::error::{LinkError, Result};

/// Default cap on normalized text length, in characters.
pub const DEFAULT_MAX_CHARS: usize = 512;

/// NFKC, trim, collapse internal whitespace, truncate to `max_chars`.
#[must_use]
pub fn normalize_text(text: &str, max_chars: usize) -> String {
    let folded: String = text.nfkc().collect();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

/// Front door to the embedding backend.
///
/// Every text is normalized and hashed; the hash keys the vector cache so
/// the backend only sees texts it has not embedded before (or whose entry
/// expired).
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    cache: Arc<VectorCache>,
    max_chars: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("backend", &self.embedder.name())
            .field("dims", &self.embedder.dims())
            .field("max_chars", &self.max_chars)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, cache: Arc<VectorCache>) -> Self {
        Self {
            embedder,
            cache,
            max_chars: DEFAULT_MAX_CHARS,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Bound each backend call. Calls that overrun are abandoned and
    /// reported as [`LinkError::EmbeddingUnavailable`].
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dims(&self) -> usize {
        self.embedder.dims()
    }

    pub fn backend_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn cache(&self) -> &Arc<VectorCache> {
        &self.cache
    }

    pub fn normalize(&self, text: &str) -> String {
        normalize_text(text, self.max_chars)
    }

    /// Embed one text, consulting the cache first.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = self.normalize(text);
        let hash = content_hash(&normalized);

        if let Some(vector) = self.cached(&hash) {
            debug!(hash = %&hash[..12], "embedding cache hit");
            return Ok(vector);
        }
        debug!(hash = %&hash[..12], "embedding cache miss");

        let vector = self.call_backend(move |embedder| embedder.embed(&normalized))?;
        self.check_dims(&vector)?;
        self.store(&hash, &vector);
        Ok(vector)
    }

    /// Embed many texts; only cache misses reach the backend, in one call.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String, String)> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            let normalized = self.normalize(text);
            let hash = content_hash(&normalized);
            match self.cached(&hash) {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    misses.push((idx, hash, normalized));
                }
            }
        }

        if !misses.is_empty() {
            debug!(
                hits = texts.len() - misses.len(),
                misses = misses.len(),
                "embedding batch"
            );
            let inputs: Vec<String> = misses.iter().map(|(_, _, text)| text.clone()).collect();
            let vectors = self.call_backend(move |embedder| embedder.embed_batch(&inputs))?;
            if vectors.len() != misses.len() {
                return Err(LinkError::EmbeddingUnavailable(format!(
                    "backend returned {} vectors for {} texts",
                    vectors.len(),
                    misses.len()
                )));
            }
            for ((idx, hash, _), vector) in misses.into_iter().zip(vectors) {
                self.check_dims(&vector)?;
                self.store(&hash, &vector);
                results[idx] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn cached(&self, hash: &str) -> Option<Vec<f32>> {
        self.cache
            .get_by_hash(hash)
            .filter(|vector| vector.len() == self.embedder.dims())
    }

    fn store(&self, hash: &str, vector: &[f32]) {
        if let Err(err) = self.cache.set_by_hash(hash, vector) {
            warn!(error = %err, "failed to persist embedding, using it uncached");
        }
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        let expected = self.embedder.dims();
        if vector.len() == expected {
            Ok(())
        } else {
            Err(LinkError::EmbeddingUnavailable(format!(
                "{} returned {} dims, expected {expected}",
                self.embedder.name(),
                vector.len()
            )))
        }
    }

    fn call_backend<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Embedder) -> Result<T> + Send + 'static,
    {
        let Some(timeout) = self.timeout else {
            return op(self.embedder.as_ref()).map_err(unavailable);
        };

        let embedder = Arc::clone(&self.embedder);
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = tx.send(op(embedder.as_ref()));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(unavailable),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, backend = self.embedder.name(), "embedding timed out");
                Err(LinkError::EmbeddingUnavailable(format!(
                    "{} timed out after {timeout:?}",
                    self.embedder.name()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::EmbeddingUnavailable(
                "embedding worker exited without a result".to_string(),
            )),
        }
    }
}

fn unavailable(err: LinkError) -> LinkError {
    match err {
        LinkError::EmbeddingUnavailable(_) => err,
        other => LinkError::EmbeddingUnavailable(other.to_string()),
    }
}
