//! Section vectors and cosine-similarity search

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::content::Track;
use crate::embedding::EmbeddingGateway;
use crate::error::Result;
use crate::search::types::{Confidence, IndexEntry, SemanticHit};

/// Tunables for the semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemanticOptions {
    /// Results returned per query.
    pub top_k: usize,
    /// Similarities at or below this are dropped.
    pub min_similarity: f32,
    /// Texts sent to the gateway per embedding call.
    pub batch_size: usize,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            top_k: 20,
            min_similarity: 0.3,
            batch_size: 50,
        }
    }
}

/// Cosine similarity; 0 for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Section vectors grouped by track, in insertion order.
#[derive(Debug, Default)]
pub struct SemanticIndex {
    tracks: RwLock<BTreeMap<Track, Vec<(String, Vec<f32>)>>>,
    options: SemanticOptions,
}

/// Result of embedding one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticBuild {
    pub stored: usize,
    pub skipped: usize,
}

impl SemanticIndex {
    pub fn new(options: SemanticOptions) -> Self {
        Self {
            tracks: RwLock::new(BTreeMap::new()),
            options,
        }
    }

    pub const fn options(&self) -> &SemanticOptions {
        &self.options
    }

    /// Embed every entry of `track` and replace that track's vectors.
    /// Batches that fail to embed are skipped.
    pub fn build(
        &self,
        track: Track,
        entries: &[IndexEntry],
        gateway: &EmbeddingGateway,
    ) -> SemanticBuild {
        let batch_size = self.options.batch_size.max(1);
        let mut vectors = Vec::with_capacity(entries.len());
        let mut skipped = 0;

        for batch in entries.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(IndexEntry::semantic_text).collect();
            match gateway.embed_batch(&texts) {
                Ok(embedded) => {
                    vectors.extend(
                        batch
                            .iter()
                            .map(|entry| entry.section_id.clone())
                            .zip(embedded),
                    );
                }
                Err(err) => {
                    warn!(%track, size = batch.len(), error = %err, "skipping batch without embeddings");
                    skipped += batch.len();
                }
            }
        }

        let stored = vectors.len();
        self.tracks.write().insert(track, vectors);
        info!(%track, stored, skipped, "built semantic index");
        SemanticBuild { stored, skipped }
    }

    pub fn len(&self) -> usize {
        self.tracks.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, section_id: &str) -> Option<Vec<f32>> {
        self.tracks.read().values().find_map(|vectors| {
            vectors
                .iter()
                .find(|(id, _)| id == section_id)
                .map(|(_, vector)| vector.clone())
        })
    }

    /// Nearest sections to `text` over every track.
    pub fn query(&self, text: &str, gateway: &EmbeddingGateway) -> Result<Vec<SemanticHit>> {
        let query = gateway.embed(text)?;
        Ok(self.nearest(&query))
    }

    /// Nearest sections to a precomputed query vector.
    pub fn nearest(&self, query: &[f32]) -> Vec<SemanticHit> {
        let tracks = self.tracks.read();
        let mut hits: Vec<SemanticHit> = tracks
            .iter()
            .flat_map(|(track, vectors)| {
                vectors.iter().filter_map(move |(section_id, vector)| {
                    let similarity = cosine_similarity(query, vector);
                    (similarity > self.options.min_similarity).then(|| SemanticHit {
                        section_id: section_id.clone(),
                        track: *track,
                        similarity,
                        confidence: Confidence::from_score(similarity),
                    })
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(self.options.top_k);
        debug!(hits = hits.len(), "semantic query");
        hits
    }
}
