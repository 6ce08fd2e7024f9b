//! Shared search types

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::{LearningPath, Track};
use crate::error::{LinkError, Result};

/// One indexed section, derived from a learning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub section_id: String,
    pub title: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub track: Track,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Canonical concept keys and raw title tokens, lower-cased.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Dictionary aliases of the matched concept keys, lower-cased.
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl IndexEntry {
    /// Text embedded for the semantic index.
    pub fn semantic_text(&self) -> String {
        match &self.preview {
            Some(preview) => format!("{} {}", self.title, preview),
            None => self.title.clone(),
        }
    }

    /// Entries for every section of a path, keywords not yet filled in.
    pub fn from_path(path: &LearningPath) -> Vec<Self> {
        path.chapters
            .iter()
            .flat_map(|chapter| {
                chapter.sections.iter().map(move |section| Self {
                    section_id: section.id.clone(),
                    title: section.title.clone(),
                    chapter_id: chapter.id.clone(),
                    chapter_title: chapter.title.clone(),
                    track: path.track,
                    preview: section.preview.clone(),
                    keywords: BTreeSet::new(),
                    aliases: BTreeSet::new(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Lexical,
    Semantic,
    Hybrid,
}

impl MatchType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence tier, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub const HIGH_THRESHOLD: f32 = 0.8;
    pub const MEDIUM_THRESHOLD: f32 = 0.6;

    pub fn from_score(score: f32) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored lexical match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalHit {
    pub section_id: String,
    pub track: Track,
    pub score: f32,
    pub matched_terms: Vec<String>,
}

/// A scored semantic match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticHit {
    pub section_id: String,
    pub track: Track,
    pub similarity: f32,
    pub confidence: Confidence,
}

/// A fused result returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub section_id: String,
    pub title: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub track: Track,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    pub fused_score: f32,
    pub match_type: MatchType,
    pub confidence: Confidence,
    pub matched_terms: Vec<String>,
    pub explanation: String,
}

/// Fusion weights and filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub lexical_weight: f32,
    pub semantic_weight: f32,
    pub quality_threshold: f32,
    pub max_results: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.4,
            semantic_weight: 0.6,
            quality_threshold: 0.65,
            max_results: 5,
        }
    }
}

impl FusionConfig {
    /// Reject negative or non-finite weights, a threshold outside `[0, 1]`
    /// and a zero result limit.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("lexical_weight", self.lexical_weight),
            ("semantic_weight", self.semantic_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(LinkError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(LinkError::InvalidConfig(format!(
                "quality_threshold must be within [0, 1], got {}",
                self.quality_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(LinkError::InvalidConfig(
                "max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with the patch applied. Not validated.
    #[must_use]
    pub fn patched(&self, patch: &FusionConfigPatch) -> Self {
        Self {
            lexical_weight: patch.lexical_weight.unwrap_or(self.lexical_weight),
            semantic_weight: patch.semantic_weight.unwrap_or(self.semantic_weight),
            quality_threshold: patch.quality_threshold.unwrap_or(self.quality_threshold),
            max_results: patch.max_results.unwrap_or(self.max_results),
        }
    }
}

/// Partial update for [`FusionConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfigPatch {
    pub lexical_weight: Option<f32>,
    pub semantic_weight: Option<f32>,
    pub quality_threshold: Option<f32>,
    pub max_results: Option<usize>,
}

/// Engine counters for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub lexical_entries: usize,
    pub semantic_entries: usize,
    pub cache_size: usize,
    pub indexed_tracks: Vec<Track>,
    pub config: FusionConfig,
}

/// Outcome of indexing one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub track: Track,
    pub sections: usize,
    pub lexical_terms: usize,
    pub semantic_vectors: usize,
    /// Sections whose embedding failed and carry no semantic signal.
    pub semantic_skipped: usize,
}
