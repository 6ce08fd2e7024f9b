//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use colored::Colorize;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;
use crate::search::{Candidate, Confidence};

pub mod cache;
pub mod related;
pub mod resolve;
pub mod stats;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Resolve(args) => resolve::run(ctx, args),
        Commands::Related(args) => related::run(ctx, args),
        Commands::Stats(args) => stats::run(ctx, args),
        Commands::Cache(args) => cache::run(ctx, args),
    }
}

/// Numbered, colored candidate list for terminal output.
pub(crate) fn print_candidates(candidates: &[Candidate]) {
    for (rank, candidate) in candidates.iter().enumerate() {
        let confidence = match candidate.confidence {
            Confidence::High => candidate.confidence.as_str().green(),
            Confidence::Medium => candidate.confidence.as_str().yellow(),
            Confidence::Low => candidate.confidence.as_str().red(),
        };
        println!(
            "{:>2}. {} {}",
            rank + 1,
            candidate.title.bold(),
            format!("[{}]", candidate.section_id).dimmed()
        );
        println!(
            "    {} / {}  {}  {:.2} {}",
            candidate.track,
            candidate.chapter_title,
            candidate.match_type.to_string().cyan(),
            candidate.fused_score,
            confidence
        );
        if !candidate.explanation.is_empty() {
            println!("    {}", candidate.explanation.dimmed());
        }
    }
}
