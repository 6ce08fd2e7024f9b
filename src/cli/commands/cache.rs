//! knowlink cache - Embedding vector cache maintenance

use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, json_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove expired and unreadable vectors
    Prune,
    /// Remove every cached vector
    Clear,
}

#[derive(Serialize)]
struct CacheOutput {
    action: &'static str,
    removed: usize,
    remaining: usize,
}

pub fn run(ctx: &AppContext, args: &CacheArgs) -> Result<()> {
    let cache = ctx.cache();
    let (action, removed) = match args.command {
        CacheCommand::Prune => ("prune", cache.cleanup_expired()?),
        CacheCommand::Clear => ("clear", cache.clear_all()?),
    };
    let output = CacheOutput {
        action,
        removed,
        remaining: cache.size(),
    };

    if ctx.json {
        return emit_json(&json_ok(output));
    }

    println!(
        "{} {} cached vector(s), {} remaining",
        "Removed".green(),
        output.removed,
        output.remaining
    );
    Ok(())
}
