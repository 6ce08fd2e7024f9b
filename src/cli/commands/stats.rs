//! knowlink stats - Index and cache statistics

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, json_ok};
use crate::error::Result;
use crate::search::{EngineStats, IndexReport};

#[derive(Args, Debug)]
pub struct StatsArgs {}

#[derive(Serialize)]
struct StatsOutput {
    engine: EngineStats,
    tracks: Vec<IndexReport>,
    embedding_backend: String,
    embedding_dims: usize,
}

pub fn run(ctx: &AppContext, _args: &StatsArgs) -> Result<()> {
    let tracks = ctx.index_tracks()?;
    let gateway = ctx.engine.gateway();
    let output = StatsOutput {
        engine: ctx.engine.stats(),
        tracks,
        embedding_backend: gateway.backend_name().to_string(),
        embedding_dims: gateway.dims(),
    };

    if ctx.json {
        return emit_json(&json_ok(output));
    }

    println!("{}", "Index".bold());
    for report in &output.tracks {
        println!(
            "  {:<12} {} sections, {} terms, {} vectors{}",
            report.track.to_string(),
            report.sections,
            report.lexical_terms,
            report.semantic_vectors,
            if report.semantic_skipped > 0 {
                format!(" ({} without embeddings)", report.semantic_skipped)
                    .yellow()
                    .to_string()
            } else {
                String::new()
            }
        );
    }
    println!("  lexical entries:  {}", output.engine.lexical_entries);
    println!("  semantic entries: {}", output.engine.semantic_entries);

    println!("{}", "Embeddings".bold());
    println!(
        "  backend: {} ({} dims)",
        output.embedding_backend, output.embedding_dims
    );
    println!("  cached vectors: {}", output.engine.cache_size);

    let config = output.engine.config;
    println!("{}", "Fusion".bold());
    println!(
        "  weights: lexical {:.2} / semantic {:.2}",
        config.lexical_weight, config.semantic_weight
    );
    println!("  quality threshold: {:.2}", config.quality_threshold);
    println!("  max results: {}", config.max_results);
    Ok(())
}
