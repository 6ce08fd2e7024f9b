//! Section resolution
//!
//! Hybrid lookup: title inverted index + embedding similarity, merged with
//! weighted fusion.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      resolve(query, track?)                    │
//! └────────────────────────────────────────────────────────────────┘
//!                     │                          │
//!                     ▼                          ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │       LexicalIndex           │  │       SemanticIndex          │
//! │  (dictionary + raw terms)    │  │  (cached embeddings)         │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                     │                          │
//!                     └──────────┬───────────────┘
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │   Weighted fusion (fusion.rs) │
//!                └───────────────────────────────┘
//!                                │
//!                                ▼
//!                     Filtered, ranked candidates
//! ```

pub mod fusion;
pub mod lexical;
pub mod semantic;
pub mod types;

pub use fusion::FusionEngine;
pub use lexical::LexicalIndex;
pub use semantic::{SemanticIndex, SemanticOptions, cosine_similarity};
pub use types::{
    Candidate, Confidence, EngineStats, FusionConfig, FusionConfigPatch, IndexEntry, IndexReport,
    LexicalHit, MatchType, SemanticHit,
};
