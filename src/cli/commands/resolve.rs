//! knowlink resolve - Link free text to learning-path sections

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, json_ok};
use crate::content::Track;
use crate::error::Result;
use crate::search::{Candidate, FusionConfigPatch};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Text to resolve (a question, an answer, a phrase)
    pub query: String,

    /// Only return lexical matches from this track (javascript, python)
    #[arg(long, short)]
    pub track: Option<Track>,

    /// Maximum number of results (overrides fusion.max_results)
    #[arg(long, short)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    query: &'a str,
    track: Option<Track>,
    candidates: Vec<Candidate>,
}

pub fn run(ctx: &AppContext, args: &ResolveArgs) -> Result<()> {
    if let Some(limit) = args.limit {
        ctx.engine.update_config(&FusionConfigPatch {
            max_results: Some(limit),
            ..FusionConfigPatch::default()
        })?;
    }
    ctx.index_tracks()?;

    let candidates = ctx.engine.resolve(&args.query, args.track);

    if ctx.json {
        return emit_json(&json_ok(ResolveOutput {
            query: &args.query,
            track: args.track,
            candidates,
        }));
    }

    if candidates.is_empty() {
        println!("{}", "No matching sections.".yellow());
        return Ok(());
    }
    super::print_candidates(&candidates);
    Ok(())
}
