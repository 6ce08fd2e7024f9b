//! knowlink related - Sections sharing keywords with a section

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_json, json_ok};
use crate::error::{LinkError, Result};
use crate::search::Candidate;

#[derive(Args, Debug)]
pub struct RelatedArgs {
    /// Section id to start from
    pub section_id: String,

    /// Maximum number of results
    #[arg(long, short, default_value = "5")]
    pub limit: usize,
}

#[derive(Serialize)]
struct RelatedOutput<'a> {
    section_id: &'a str,
    related: Vec<Candidate>,
}

pub fn run(ctx: &AppContext, args: &RelatedArgs) -> Result<()> {
    ctx.index_tracks()?;

    if ctx.engine.section(&args.section_id).is_none() {
        return Err(LinkError::NotFound(format!("section {}", args.section_id)));
    }

    let related = ctx.engine.related_sections(&args.section_id, args.limit);

    if ctx.json {
        return emit_json(&json_ok(RelatedOutput {
            section_id: &args.section_id,
            related,
        }));
    }

    if related.is_empty() {
        println!("{}", "No related sections.".yellow());
        return Ok(());
    }
    super::print_candidates(&related);
    Ok(())
}
