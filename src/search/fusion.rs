//! Hybrid resolution: lexical and semantic lookups fused into one ranking
//!
//! ```text
//!            query
//!              │
//!     ┌────────┴─────────┐   rayon::join
//!     ▼                  ▼
//!  LexicalIndex     EmbeddingGateway → SemanticIndex
//!     │                  │
//!     └────────┬─────────┘
//!              ▼
//!   weighted merge → quality threshold → diversity → top N
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::content::{LearningPath, Track};
use crate::embedding::EmbeddingGateway;
use crate::error::{LinkError, Result};
use crate::search::lexical::LexicalIndex;
use crate::search::semantic::{SemanticIndex, SemanticOptions};
use crate::search::types::{
    Candidate, Confidence, EngineStats, FusionConfig, FusionConfigPatch, IndexEntry, IndexReport,
    LexicalHit, MatchType, SemanticHit,
};

/// Candidates always accepted by the diversity filter, whatever their keywords.
const DIVERSITY_FLOOR: usize = 2;

/// A merged score before section metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub section_id: String,
    pub track: Track,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
    pub fused_score: f32,
    pub match_type: MatchType,
    pub confidence: Confidence,
    pub matched_terms: Vec<String>,
}

/// Weighted merge of both signals, sorted by fused score (stable).
pub fn merge(lexical: &[LexicalHit], semantic: &[SemanticHit], config: &FusionConfig) -> Vec<Scored> {
    let mut merged: Vec<Scored> = Vec::with_capacity(lexical.len() + semantic.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for hit in lexical {
        if positions.contains_key(&hit.section_id) {
            continue;
        }
        positions.insert(hit.section_id.clone(), merged.len());
        merged.push(Scored {
            section_id: hit.section_id.clone(),
            track: hit.track,
            lexical_score: Some(hit.score),
            semantic_score: None,
            fused_score: hit.score * config.lexical_weight,
            match_type: MatchType::Lexical,
            confidence: Confidence::from_score(hit.score),
            matched_terms: hit.matched_terms.clone(),
        });
    }

    for hit in semantic {
        match positions.get(&hit.section_id) {
            Some(&position) => {
                let existing = &mut merged[position];
                if existing.semantic_score.is_some() {
                    continue;
                }
                existing.fused_score += hit.similarity * config.semantic_weight;
                existing.semantic_score = Some(hit.similarity);
                existing.match_type = MatchType::Hybrid;
                existing.confidence = existing.confidence.max(hit.confidence);
            }
            None => {
                positions.insert(hit.section_id.clone(), merged.len());
                merged.push(Scored {
                    section_id: hit.section_id.clone(),
                    track: hit.track,
                    lexical_score: None,
                    semantic_score: Some(hit.similarity),
                    fused_score: hit.similarity * config.semantic_weight,
                    match_type: MatchType::Semantic,
                    confidence: hit.confidence,
                    matched_terms: Vec::new(),
                });
            }
        }
    }

    merged.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
    merged
}

/// Drop candidates scoring below `threshold`; equal scores stay.
pub fn apply_quality_threshold(scored: Vec<Scored>, threshold: f32) -> Vec<Scored> {
    scored
        .into_iter()
        .filter(|candidate| candidate.fused_score >= threshold)
        .collect()
}

/// Keep a candidate if it brings a keyword no accepted candidate has, or
/// while fewer than two are accepted.
pub fn diversify<F>(scored: Vec<Scored>, keywords_of: F) -> Vec<Scored>
where
    F: Fn(&str) -> BTreeSet<String>,
{
    let mut covered: HashSet<String> = HashSet::new();
    let mut accepted = Vec::new();
    for candidate in scored {
        let keywords = keywords_of(&candidate.section_id);
        let brings_new = keywords.iter().any(|keyword| !covered.contains(keyword));
        if brings_new || accepted.len() < DIVERSITY_FLOOR {
            covered.extend(keywords);
            accepted.push(candidate);
        }
    }
    accepted
}

/// Human-readable reason a candidate was returned.
pub fn explain(scored: &Scored) -> String {
    let lexical = scored.lexical_score.map(|score| {
        if scored.matched_terms.is_empty() {
            format!("lexical score {score:.2}")
        } else {
            format!(
                "lexical match on {} ({score:.2})",
                scored.matched_terms.join(", ")
            )
        }
    });
    let semantic = scored
        .semantic_score
        .map(|similarity| format!("semantic similarity {similarity:.2}"));

    match (lexical, semantic) {
        (Some(lexical), Some(semantic)) => format!("{lexical}; {semantic}"),
        (Some(lexical), None) => lexical,
        (None, Some(semantic)) => semantic,
        (None, None) => String::new(),
    }
}

/// Links free text to sections of the indexed learning paths.
pub struct FusionEngine {
    lexical: LexicalIndex,
    semantic: SemanticIndex,
    gateway: Arc<EmbeddingGateway>,
    config: RwLock<FusionConfig>,
    ready: Mutex<BTreeSet<Track>>,
    ready_signal: Condvar,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("lexical", &self.lexical)
            .field("semantic_entries", &self.semantic.len())
            .field("gateway", &self.gateway)
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

impl FusionEngine {
    /// Engine with default index settings.
    pub fn new(gateway: Arc<EmbeddingGateway>, config: FusionConfig) -> Result<Self> {
        Self::with_indexes(
            gateway,
            config,
            LexicalIndex::default(),
            SemanticIndex::new(SemanticOptions::default()),
        )
    }

    pub fn with_indexes(
        gateway: Arc<EmbeddingGateway>,
        config: FusionConfig,
        lexical: LexicalIndex,
        semantic: SemanticIndex,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lexical,
            semantic,
            gateway,
            config: RwLock::new(config),
            ready: Mutex::new(BTreeSet::new()),
            ready_signal: Condvar::new(),
        })
    }

    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    /// Build both indexes for the path's track, replacing any earlier build.
    pub fn index_track(&self, path: &LearningPath) -> Result<IndexReport> {
        let track = path.track;
        let entries = IndexEntry::from_path(path);
        self.check_collisions(track, &entries)?;

        self.ready.lock().remove(&track);
        let started = Instant::now();

        let lexical_terms = self.lexical.build(track, entries.clone());
        let semantic = self.semantic.build(track, &entries, &self.gateway);

        self.ready.lock().insert(track);
        self.ready_signal.notify_all();

        let report = IndexReport {
            track,
            sections: entries.len(),
            lexical_terms,
            semantic_vectors: semantic.stored,
            semantic_skipped: semantic.skipped,
        };
        info!(
            %track,
            sections = report.sections,
            semantic_skipped = report.semantic_skipped,
            elapsed_ms = started.elapsed().as_millis(),
            "track indexed"
        );
        Ok(report)
    }

    fn check_collisions(&self, track: Track, entries: &[IndexEntry]) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in entries {
            if !seen.insert(entry.section_id.as_str()) {
                return Err(LinkError::DuplicateSection {
                    section_id: entry.section_id.clone(),
                    existing: track,
                    incoming: track,
                });
            }
            if let Some(existing) = self.lexical.track_of(&entry.section_id) {
                if existing != track {
                    return Err(LinkError::DuplicateSection {
                        section_id: entry.section_id.clone(),
                        existing,
                        incoming: track,
                    });
                }
            }
        }
        Ok(())
    }

    /// Best sections for `query`, at most `max_results`.
    ///
    /// Never fails: a missing track index or an unavailable embedding
    /// backend only removes that signal.
    pub fn resolve(&self, query: &str, track: Option<Track>) -> Vec<Candidate> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let config = *self.config.read();

        let (lexical, semantic) = rayon::join(
            || self.lexical_hits(query, track),
            || self.semantic_hits(query),
        );
        debug!(lexical = lexical.len(), semantic = semantic.len(), "retrieved signals");

        let merged = merge(&lexical, &semantic, &config);
        let passed = apply_quality_threshold(merged, config.quality_threshold);
        let mut diverse = diversify(passed, |section_id| {
            self.lexical
                .entry(section_id)
                .map(|entry| entry.keywords)
                .unwrap_or_default()
        });
        diverse.truncate(config.max_results);

        diverse
            .into_iter()
            .filter_map(|scored| self.candidate(scored))
            .collect()
    }

    fn lexical_hits(&self, query: &str, track: Option<Track>) -> Vec<LexicalHit> {
        match self.lexical.query(query, track) {
            Ok(hits) => hits,
            Err(LinkError::IndexNotBuilt(track)) => {
                debug!(%track, "track not indexed yet, no lexical signal");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "lexical lookup failed");
                Vec::new()
            }
        }
    }

    fn semantic_hits(&self, query: &str) -> Vec<SemanticHit> {
        if self.semantic.is_empty() {
            return Vec::new();
        }
        semantic_or_empty(self.semantic.query(query, &self.gateway))
    }

    fn candidate(&self, mut scored: Scored) -> Option<Candidate> {
        let Some(entry) = self.lexical.entry(&scored.section_id) else {
            warn!(section_id = %scored.section_id, "candidate without index entry");
            return None;
        };
        scored.fused_score = scored.fused_score.clamp(0.0, 1.0);
        let explanation = explain(&scored);
        Some(Candidate {
            section_id: scored.section_id,
            title: entry.title,
            chapter_id: entry.chapter_id,
            chapter_title: entry.chapter_title,
            track: scored.track,
            lexical_score: scored.lexical_score,
            semantic_score: scored.semantic_score,
            fused_score: scored.fused_score,
            match_type: scored.match_type,
            confidence: scored.confidence,
            matched_terms: scored.matched_terms,
            explanation,
        })
    }

    /// Indexed entry for a section, keywords included.
    pub fn section(&self, section_id: &str) -> Option<IndexEntry> {
        self.lexical.entry(section_id)
    }

    /// Sections of the same track sharing keywords with `section_id`.
    pub fn related_sections(&self, section_id: &str, max: usize) -> Vec<Candidate> {
        self.lexical
            .related(section_id, max)
            .into_iter()
            .filter_map(|hit| {
                let mut candidate = self.candidate(Scored {
                    section_id: hit.section_id,
                    track: hit.track,
                    lexical_score: Some(hit.score),
                    semantic_score: None,
                    fused_score: hit.score,
                    match_type: MatchType::Lexical,
                    confidence: Confidence::from_score(hit.score),
                    matched_terms: hit.matched_terms,
                })?;
                candidate.explanation =
                    format!("shares keywords: {}", candidate.matched_terms.join(", "));
                Some(candidate)
            })
            .collect()
    }

    pub fn config(&self) -> FusionConfig {
        *self.config.read()
    }

    /// Apply a partial update. Invalid values leave the config untouched.
    pub fn update_config(&self, patch: &FusionConfigPatch) -> Result<()> {
        let mut config = self.config.write();
        let updated = config.patched(patch);
        updated.validate()?;
        *config = updated;
        drop(config);

        self.lexical.clear_cache();
        info!(?updated, "fusion config updated");
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            lexical_entries: self.lexical.len(),
            semantic_entries: self.semantic.len(),
            cache_size: self.gateway.cache().size(),
            indexed_tracks: self.ready.lock().iter().copied().collect(),
            config: self.config(),
        }
    }

    pub fn clear_cache(&self) {
        self.lexical.clear_cache();
    }

    pub fn is_ready(&self, track: Track) -> bool {
        self.ready.lock().contains(&track)
    }

    /// Block until `track` is indexed or `timeout` passes.
    pub fn wait_until_ready(&self, track: Track, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        while !ready.contains(&track) {
            if self.ready_signal.wait_until(&mut ready, deadline).timed_out() {
                return ready.contains(&track);
            }
        }
        true
    }
}

/// Semantic hits, or none when the lookup failed. Resolution never fails on
/// the semantic side; only the log level tells an outage from a bug.
fn semantic_or_empty(result: Result<Vec<SemanticHit>>) -> Vec<SemanticHit> {
    match result {
        Ok(hits) => hits,
        Err(err) => {
            if err.is_degradation() {
                warn!(error = %err, "semantic lookup unavailable, using lexical results only");
            } else {
                error!(error = %err, "semantic lookup failed unexpectedly, using lexical results only");
            }
            Vec::new()
        }
    }
}
