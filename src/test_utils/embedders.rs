//! Embedding backends with scripted behavior for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::embedding::{Embedder, HashEmbedder};
use crate::error::{LinkError, Result};

/// Hash embedder that counts how many texts reached it.
pub struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            inner: HashEmbedder::new(dims),
            calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Texts embedded so far, single and batched.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        texts.iter().map(|text| self.inner.embed(text)).collect()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Always unavailable.
pub struct FailingEmbedder {
    dims: usize,
}

impl FailingEmbedder {
    pub const fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(LinkError::EmbeddingUnavailable(
            "model failed to load".to_string(),
        ))
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Sleeps before answering, for timeout tests.
pub struct SlowEmbedder {
    inner: HashEmbedder,
    delay: Duration,
}

impl SlowEmbedder {
    pub const fn new(dims: usize, delay: Duration) -> Self {
        Self {
            inner: HashEmbedder::new(dims),
            delay,
        }
    }
}

impl Embedder for SlowEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        std::thread::sleep(self.delay);
        self.inner.embed(text)
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// One dimension per keyword: 1.0 when the lower-cased text contains it.
/// Makes similarities predictable.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|keyword| if lowered.contains(keyword.as_str()) { 1.0 } else { 0.0 })
            .collect())
    }

    fn dims(&self) -> usize {
        self.keywords.len()
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Zero vectors: never similar to anything.
pub struct ZeroEmbedder {
    dims: usize,
}

impl ZeroEmbedder {
    pub const fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Embedder for ZeroEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dims])
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "zero"
    }
}
