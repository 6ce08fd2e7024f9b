use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::cache::{DEFAULT_TTL, VectorCache};
use crate::content::{Chapter, LearningPath, Section, Track};
use crate::embedding::{Embedder, EmbeddingGateway};
use crate::search::{FusionConfig, FusionEngine, IndexEntry};

/// Markdown outline of a small JavaScript track.
pub const SAMPLE_JS_MARKDOWN: &str = "\
# JavaScript Basics

## Getting Started (id: js-start)

### Variables and Constants (id: js-variables)
Declare values with let and const.

### Data Types (id: js-types)
Strings, numbers and booleans.

## Control Flow (id: js-flow)

### Conditional Statements (id: js-if)
Branching with if and else.

### Loops (id: js-loops)
Repeat work with for and while.

## Asynchronous JavaScript (id: js-async)

### Promise Basics (id: js-promise)
Chain work with then and catch.

### Async Await (id: js-await)
Write asynchronous code that reads top to bottom.
";

/// Markdown outline of a small Python track.
pub const SAMPLE_PY_MARKDOWN: &str = "\
# Python Basics

## Fundamentals (id: py-basics)

### Variables and Assignment (id: py-variables)
Names bound to values.

### Functions with def (id: py-functions)
Parameters and return values.

## Data Structures (id: py-data)

### Lists and Slicing (id: py-lists)
Append, index and slice.

### Dictionaries (id: py-dicts)
Key value pairs with dict.
";

/// Test fixture providing isolated filesystem environment.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl UnitTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {:?}", data_path);

        Self { temp_dir, data_path }
    }

    /// Create a test file with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Write a markdown track outline under `tracks/`.
    pub fn create_track(&self, name: &str, markdown: &str) -> PathBuf {
        self.create_file(&format!("tracks/{name}.md"), markdown)
    }
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}

/// Bare index entry in chapter `ch1`.
pub fn entry(track: Track, id: &str, title: &str) -> IndexEntry {
    IndexEntry {
        section_id: id.to_string(),
        title: title.to_string(),
        chapter_id: "ch1".to_string(),
        chapter_title: "Chapter One".to_string(),
        track,
        preview: None,
        keywords: Default::default(),
        aliases: Default::default(),
    }
}

/// Single-chapter learning path with the given `(id, title)` sections.
pub fn learning_path(track: Track, sections: &[(&str, &str)]) -> LearningPath {
    let mut path = LearningPath::new(track, format!("{track}-fixture"), "Fixture");
    path.chapters.push(Chapter {
        id: "ch1".to_string(),
        title: "Chapter One".to_string(),
        sections: sections
            .iter()
            .map(|(id, title)| Section {
                id: (*id).to_string(),
                title: (*title).to_string(),
                chapter_id: "ch1".to_string(),
                preview: None,
            })
            .collect(),
    });
    path
}

/// Engine over an in-memory cache.
pub fn engine(embedder: Arc<dyn Embedder>, config: FusionConfig) -> FusionEngine {
    let gateway = EmbeddingGateway::new(embedder, Arc::new(VectorCache::in_memory(DEFAULT_TTL)));
    FusionEngine::new(Arc::new(gateway), config).expect("valid fusion config")
}
