//! Text embeddings: pluggable backends behind a caching gateway.

pub mod backends;
pub mod gateway;

pub use backends::{ApiEmbedder, Embedder, FallbackEmbedder, HashEmbedder, build_embedder};
pub use gateway::{DEFAULT_MAX_CHARS, EmbeddingGateway, normalize_text};
