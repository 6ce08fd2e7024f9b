pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod dictionary;
pub mod embedding;
pub mod error;
pub mod search;
pub mod test_utils;

pub use error::{LinkError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
