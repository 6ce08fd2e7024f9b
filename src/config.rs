use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::content::Track;
use crate::error::{LinkError, Result};
use crate::search::{FusionConfig, SemanticOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fusion: FusionSettings,
    #[serde(default)]
    pub lexical: LexicalSettings,
    #[serde(default)]
    pub semantic: SemanticSettings,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tracks: TracksConfig,
}

impl Config {
    /// Defaults, then an explicit file (`--config` or `KNOWLINK_CONFIG`) or
    /// the global and project files, then `KNOWLINK_*` overrides.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("KNOWLINK_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let path = dirs::config_dir()
            .ok_or_else(|| LinkError::MissingConfig("config directory not found".to_string()))?
            .join("knowlink/config.toml");
        Self::load_patch(&path)
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        let path = project_root.join(".knowlink/config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| LinkError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| LinkError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.fusion {
            self.fusion.merge(patch);
        }
        if let Some(patch) = patch.lexical {
            self.lexical.merge(patch);
        }
        if let Some(patch) = patch.semantic {
            self.semantic.merge(patch);
        }
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.cache {
            self.cache.merge(patch);
        }
        if let Some(patch) = patch.tracks {
            self.tracks.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_var(&var, "KNOWLINK_FUSION_LEXICAL_WEIGHT")? {
            self.fusion.lexical_weight = value;
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_FUSION_SEMANTIC_WEIGHT")? {
            self.fusion.semantic_weight = value;
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_FUSION_QUALITY_THRESHOLD")? {
            self.fusion.quality_threshold = value;
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_FUSION_MAX_RESULTS")? {
            self.fusion.max_results = value;
        }

        if let Some(value) = parse_var(&var, "KNOWLINK_LEXICAL_CACHE_CAPACITY")? {
            self.lexical.cache_capacity = value;
        }

        if let Some(value) = parse_var(&var, "KNOWLINK_SEMANTIC_TOP_K")? {
            self.semantic.top_k = value;
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_SEMANTIC_MIN_SIMILARITY")? {
            self.semantic.min_similarity = value;
        }

        if let Some(value) = var("KNOWLINK_EMBEDDING_BACKEND") {
            self.embedding.backend = value;
        }
        if let Some(value) = var("KNOWLINK_EMBEDDING_FALLBACK") {
            self.embedding.fallback_backend = Some(value);
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_EMBEDDING_DIMS")? {
            self.embedding.dims = value;
        }
        if let Some(value) = var("KNOWLINK_EMBEDDING_API_URL") {
            self.embedding.api_url = Some(value);
        }
        if let Some(value) = var("KNOWLINK_EMBEDDING_API_MODEL") {
            self.embedding.api_model = Some(value);
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_EMBEDDING_TIMEOUT_MS")? {
            self.embedding.timeout_ms = value;
        }

        if bool_var(&var, "KNOWLINK_CACHE_DISABLED").unwrap_or(false) {
            self.cache.enabled = false;
        }
        if let Some(value) = var("KNOWLINK_CACHE_PATH") {
            self.cache.path = Some(PathBuf::from(value));
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_CACHE_TTL_SECONDS")? {
            self.cache.ttl_seconds = value;
        }
        if let Some(value) = parse_var(&var, "KNOWLINK_CACHE_MAX_SIZE_MB")? {
            self.cache.max_size_mb = value;
        }

        if let Some(value) = var("KNOWLINK_TRACKS_JAVASCRIPT") {
            self.tracks.javascript = Some(PathBuf::from(value));
        }
        if let Some(value) = var("KNOWLINK_TRACKS_PYTHON") {
            self.tracks.python = Some(PathBuf::from(value));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSettings {
    #[serde(default)]
    pub lexical_weight: f32,
    #[serde(default)]
    pub semantic_weight: f32,
    #[serde(default)]
    pub quality_threshold: f32,
    #[serde(default)]
    pub max_results: usize,
}

impl Default for FusionSettings {
    fn default() -> Self {
        let defaults = FusionConfig::default();
        Self {
            lexical_weight: defaults.lexical_weight,
            semantic_weight: defaults.semantic_weight,
            quality_threshold: defaults.quality_threshold,
            max_results: defaults.max_results,
        }
    }
}

impl FusionSettings {
    fn merge(&mut self, patch: FusionPatch) {
        if let Some(value) = patch.lexical_weight {
            self.lexical_weight = value;
        }
        if let Some(value) = patch.semantic_weight {
            self.semantic_weight = value;
        }
        if let Some(value) = patch.quality_threshold {
            self.quality_threshold = value;
        }
        if let Some(value) = patch.max_results {
            self.max_results = value;
        }
    }

    /// Validated engine config.
    pub fn to_fusion_config(&self) -> Result<FusionConfig> {
        let config = FusionConfig {
            lexical_weight: self.lexical_weight,
            semantic_weight: self.semantic_weight,
            quality_threshold: self.quality_threshold,
            max_results: self.max_results,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalSettings {
    /// Entries kept in the query result cache.
    #[serde(default)]
    pub cache_capacity: usize,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        Self {
            cache_capacity: crate::search::lexical::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl LexicalSettings {
    fn merge(&mut self, patch: LexicalPatch) {
        if let Some(value) = patch.cache_capacity {
            self.cache_capacity = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSettings {
    #[serde(default)]
    pub top_k: usize,
    #[serde(default)]
    pub min_similarity: f32,
    #[serde(default)]
    pub batch_size: usize,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        let defaults = SemanticOptions::default();
        Self {
            top_k: defaults.top_k,
            min_similarity: defaults.min_similarity,
            batch_size: defaults.batch_size,
        }
    }
}

impl SemanticSettings {
    fn merge(&mut self, patch: SemanticPatch) {
        if let Some(value) = patch.top_k {
            self.top_k = value;
        }
        if let Some(value) = patch.min_similarity {
            self.min_similarity = value;
        }
        if let Some(value) = patch.batch_size {
            self.batch_size = value;
        }
    }

    pub const fn to_options(&self) -> SemanticOptions {
        SemanticOptions {
            top_k: self.top_k,
            min_similarity: self.min_similarity,
            batch_size: self.batch_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `hash` or `api`.
    #[serde(default)]
    pub backend: String,
    /// Backend tried when the primary fails.
    #[serde(default)]
    pub fallback_backend: Option<String>,
    #[serde(default)]
    pub dims: usize,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            fallback_backend: None,
            dims: 384,
            api_url: None,
            api_model: None,
            api_key_env: Some("KNOWLINK_API_KEY".to_string()),
            timeout_ms: 5_000,
            max_chars: crate::embedding::DEFAULT_MAX_CHARS,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.fallback_backend {
            self.fallback_backend = Some(value);
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
        if let Some(value) = patch.api_url {
            self.api_url = Some(value);
        }
        if let Some(value) = patch.api_model {
            self.api_model = Some(value);
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = Some(value);
        }
        if let Some(value) = patch.timeout_ms {
            self.timeout_ms = value;
        }
        if let Some(value) = patch.max_chars {
            self.max_chars = value;
        }
    }

    /// Gateway-side timeout; `None` when disabled (0).
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist vectors in SQLite; otherwise they live in memory only.
    #[serde(default)]
    pub enabled: bool,
    /// Database path; defaults under the user data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub max_size_mb: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            ttl_seconds: crate::cache::DEFAULT_TTL.as_secs(),
            max_size_mb: 64,
        }
    }
}

impl CacheConfig {
    fn merge(&mut self, patch: CachePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.path {
            self.path = Some(value);
        }
        if let Some(value) = patch.ttl_seconds {
            self.ttl_seconds = value;
        }
        if let Some(value) = patch.max_size_mb {
            self.max_size_mb = value;
        }
    }

    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Byte quota, `None` when unlimited (0).
    pub const fn max_bytes(&self) -> Option<u64> {
        if self.max_size_mb == 0 {
            None
        } else {
            Some(self.max_size_mb as u64 * 1024 * 1024)
        }
    }

    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| LinkError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("knowlink").join("vectors.db"))
    }
}

/// Where each track's learning path lives on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracksConfig {
    #[serde(default)]
    pub javascript: Option<PathBuf>,
    #[serde(default)]
    pub python: Option<PathBuf>,
}

impl TracksConfig {
    fn merge(&mut self, patch: TracksPatch) {
        if let Some(value) = patch.javascript {
            self.javascript = Some(value);
        }
        if let Some(value) = patch.python {
            self.python = Some(value);
        }
    }

    pub fn path_for(&self, track: Track) -> Option<&Path> {
        match track {
            Track::JavaScript => self.javascript.as_deref(),
            Track::Python => self.python.as_deref(),
        }
    }

    pub fn set(&mut self, track: Track, path: PathBuf) {
        match track {
            Track::JavaScript => self.javascript = Some(path),
            Track::Python => self.python = Some(path),
        }
    }

    /// Configured `(track, path)` pairs in track order.
    pub fn configured(&self) -> Vec<(Track, PathBuf)> {
        Track::ALL
            .iter()
            .filter_map(|track| self.path_for(*track).map(|path| (*track, path.to_path_buf())))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub fusion: Option<FusionPatch>,
    pub lexical: Option<LexicalPatch>,
    pub semantic: Option<SemanticPatch>,
    pub embedding: Option<EmbeddingPatch>,
    pub cache: Option<CachePatch>,
    pub tracks: Option<TracksPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FusionPatch {
    pub lexical_weight: Option<f32>,
    pub semantic_weight: Option<f32>,
    pub quality_threshold: Option<f32>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LexicalPatch {
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SemanticPatch {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbeddingPatch {
    pub backend: Option<String>,
    pub fallback_backend: Option<String>,
    pub dims: Option<usize>,
    pub api_url: Option<String>,
    pub api_model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CachePatch {
    pub enabled: Option<bool>,
    pub path: Option<PathBuf>,
    pub ttl_seconds: Option<u64>,
    pub max_size_mb: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TracksPatch {
    pub javascript: Option<PathBuf>,
    pub python: Option<PathBuf>,
}

fn bool_var<F>(var: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|err| {
            LinkError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
