//! Wiring from configuration to a ready engine.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{KvStore, MemoryStore, SqliteStore, VectorCache};
use crate::cli::Cli;
use crate::config::Config;
use crate::content::{Track, load_learning_path};
use crate::embedding::{Embedder, EmbeddingGateway, build_embedder};
use crate::error::Result;
use crate::search::{FusionEngine, IndexReport, LexicalIndex, SemanticIndex};

pub struct AppContext {
    pub config: Config,
    pub json: bool,
    pub engine: FusionEngine,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let mut config = Config::load(cli.config.as_deref(), &cwd)?;
        for (track, path) in &cli.track_files {
            config.tracks.set(*track, path.clone());
        }
        Self::from_config(config, cli.json)
    }

    pub fn from_config(config: Config, json: bool) -> Result<Self> {
        let store: Arc<dyn KvStore> = if config.cache.enabled {
            let path = config.cache.resolved_path()?;
            debug!(path = %path.display(), "using persistent vector cache");
            Arc::new(SqliteStore::open(&path, config.cache.max_bytes())?)
        } else {
            Arc::new(MemoryStore::new())
        };
        let cache = Arc::new(VectorCache::new(store, config.cache.ttl()));

        let embedder: Arc<dyn Embedder> = Arc::from(build_embedder(&config.embedding)?);
        let gateway = EmbeddingGateway::new(embedder, cache)
            .with_max_chars(config.embedding.max_chars)
            .with_timeout(config.embedding.timeout());

        let engine = FusionEngine::with_indexes(
            Arc::new(gateway),
            config.fusion.to_fusion_config()?,
            LexicalIndex::new(config.lexical.cache_capacity),
            SemanticIndex::new(config.semantic.to_options()),
        )?;

        Ok(Self {
            config,
            json,
            engine,
        })
    }

    pub fn cache(&self) -> &Arc<VectorCache> {
        self.engine.gateway().cache()
    }

    /// Load and index every configured track.
    pub fn index_tracks(&self) -> Result<Vec<IndexReport>> {
        let tracks = self.config.tracks.configured();
        if tracks.is_empty() {
            warn!("no learning paths configured; pass --track-file TRACK=PATH");
        }
        tracks
            .iter()
            .map(|(track, path)| self.index_track_file(*track, path))
            .collect()
    }

    fn index_track_file(&self, track: Track, path: &Path) -> Result<IndexReport> {
        let learning_path = load_learning_path(track, path)?;
        self.engine.index_track(&learning_path)
    }
}
