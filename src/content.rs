//! Content tracks and learning-path loading
//!
//! A track is one independently indexed curriculum. Learning paths arrive
//! either as JSON (the serialized `LearningPath`) or as a markdown outline:
//!
//! ```text
//! # JavaScript Basics
//! ## Control Flow (id: js-ch-2)
//! ### if statements (id: js-sec-2-1)
//! Optional preview text for the section.
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LinkError, Result};

/// Maximum characters kept from a section body as its preview.
pub const PREVIEW_MAX_CHARS: usize = 200;

static HEADING_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(id:\s*(.*?)\)").unwrap());

/// A content track (one curriculum language).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    JavaScript,
    Python,
}

impl Track {
    /// All known tracks in tie-break order.
    pub const ALL: [Self; 2] = [Self::JavaScript, Self::Python];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" => Ok(Self::JavaScript),
            "python" | "py" => Ok(Self::Python),
            other => Err(LinkError::Config(format!(
                "unknown track {other} (expected javascript|python)"
            ))),
        }
    }
}

/// A full curriculum for one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: String,
    pub title: String,
    pub track: Track,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(rename = "chapterId", alias = "chapter_id")]
    pub chapter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl LearningPath {
    /// Create an empty learning path for a track.
    pub fn new(track: Track, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            track,
            chapters: Vec::new(),
        }
    }

    /// Number of sections across all chapters.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.chapters.iter().map(|c| c.sections.len()).sum()
    }

    /// Iterate `(chapter, section)` pairs in curriculum order.
    pub fn sections(&self) -> impl Iterator<Item = (&Chapter, &Section)> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.sections.iter().map(move |section| (chapter, section)))
    }
}

/// Load a learning path from disk. `.json` files are deserialized directly,
/// anything else is parsed as a markdown outline.
pub fn load_learning_path(track: Track, path: impl AsRef<Path>) -> Result<LearningPath> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let learning_path = if is_json {
        let parsed: LearningPath = serde_json::from_str(&raw).map_err(|err| {
            LinkError::ContentParse(format!("parse {}: {err}", path.display()))
        })?;
        if parsed.track != track {
            return Err(LinkError::ContentParse(format!(
                "{} declares track {}, expected {track}",
                path.display(),
                parsed.track
            )));
        }
        parsed
    } else {
        parse_markdown_path(track, &raw)
    };

    debug!(
        track = %track,
        path = %path.display(),
        chapters = learning_path.chapters.len(),
        sections = learning_path.section_count(),
        "loaded learning path"
    );
    Ok(learning_path)
}

/// Parse a markdown learning-path outline.
///
/// Headings without an `(id: ...)` marker and sections appearing before any
/// chapter are skipped.
#[must_use]
pub fn parse_markdown_path(track: Track, markdown: &str) -> LearningPath {
    let mut path = LearningPath::new(track, format!("{track}-path"), String::new());
    let mut preview = String::new();
    // Body text only belongs to the section heading directly above it.
    let mut in_section = false;

    for line in markdown.lines() {
        if let Some(rest) = line.strip_prefix("### ") {
            flush_preview(&mut path, &mut preview);
            in_section = false;
            let Some(id) = heading_id(rest) else {
                warn!(line, "section heading without id, skipping");
                continue;
            };
            let Some(chapter) = path.chapters.last_mut() else {
                warn!(section = %id, "section before any chapter, skipping");
                continue;
            };
            chapter.sections.push(Section {
                id,
                title: heading_title(rest),
                chapter_id: chapter.id.clone(),
                preview: None,
            });
            in_section = true;
        } else if let Some(rest) = line.strip_prefix("## ") {
            flush_preview(&mut path, &mut preview);
            in_section = false;
            match heading_id(rest) {
                Some(id) => path.chapters.push(Chapter {
                    id,
                    title: heading_title(rest),
                    sections: Vec::new(),
                }),
                None => warn!(line, "chapter heading without id, skipping"),
            }
        } else if let Some(rest) = line.strip_prefix("# ") {
            flush_preview(&mut path, &mut preview);
            in_section = false;
            if path.title.is_empty() {
                path.title = heading_title(rest);
            }
        } else if in_section && !line.trim().is_empty() {
            if !preview.is_empty() {
                preview.push(' ');
            }
            preview.push_str(line.trim());
        }
    }
    flush_preview(&mut path, &mut preview);

    path
}

fn heading_id(heading: &str) -> Option<String> {
    HEADING_ID_REGEX
        .captures(heading)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
}

fn heading_title(heading: &str) -> String {
    HEADING_ID_REGEX.replace(heading, "").trim().to_string()
}

/// Attach accumulated body text to the most recent section, if any.
fn flush_preview(path: &mut LearningPath, preview: &mut String) {
    if preview.is_empty() {
        return;
    }
    let text = std::mem::take(preview);
    if let Some(section) = path
        .chapters
        .last_mut()
        .and_then(|chapter| chapter.sections.last_mut())
    {
        if section.preview.is_none() {
            section.preview = Some(text.chars().take(PREVIEW_MAX_CHARS).collect());
        }
    }
}
