//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::content::Track;

pub mod commands;
pub mod output;

/// knowlink - link free text to sections of programming learning paths
#[derive(Parser, Debug)]
#[command(name = "knowlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit machine-readable JSON (results on stdout, logs on stderr)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/knowlink/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Learning path for a track, overriding config (e.g. python=python.md)
    #[arg(long = "track-file", value_name = "TRACK=PATH", value_parser = parse_track_file, global = true)]
    pub track_files: Vec<(Track, PathBuf)>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find the sections a piece of text is about
    Resolve(commands::resolve::ResolveArgs),

    /// List sections related to a section
    Related(commands::related::RelatedArgs),

    /// Show index and cache statistics
    Stats(commands::stats::StatsArgs),

    /// Manage the embedding vector cache
    Cache(commands::cache::CacheArgs),
}

fn parse_track_file(raw: &str) -> std::result::Result<(Track, PathBuf), String> {
    let (track, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TRACK=PATH, got {raw}"))?;
    let track = track.trim().parse::<Track>().map_err(|err| err.to_string())?;
    let path = path.trim();
    if path.is_empty() {
        return Err(format!("missing path for track {track}"));
    }
    Ok((track, PathBuf::from(path)))
}
