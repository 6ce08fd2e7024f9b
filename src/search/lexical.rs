//! Per-track inverted index over section titles
//!
//! Titles are analyzed two ways: dictionary concepts whose surface forms
//! appear in the title contribute their canonical key (plus aliases), and
//! raw alphabetic / CJK tokens are taken as-is. Queries are scored with a
//! tiered rule and normalized by the number of query terms.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::LazyLock;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, info};

use crate::content::Track;
use crate::dictionary::TermDictionary;
use crate::error::{LinkError, Result};
use crate::search::types::{IndexEntry, LexicalHit};

static RAW_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").unwrap());
static CJK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\x{4e00}-\x{9fa5}]{2,4}").unwrap());

/// Characters of the query used in the result cache key.
const CACHE_KEY_CHARS: usize = 100;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

const TITLE_CONTAINS: f32 = 3.0;
const KEYWORD_EQUALS: f32 = 2.0;
const ALIAS_EQUALS: f32 = 1.5;
const KEYWORD_CONTAINS: f32 = 1.0;

/// Minimum surface length (exclusive) for dictionary terms pulled from a query.
const QUERY_SURFACE_MIN_CHARS: usize = 2;

type CacheKey = (String, Option<Track>);

#[derive(Debug, Default)]
struct TrackIndex {
    entries: Vec<IndexEntry>,
    by_id: HashMap<String, usize>,
    postings: HashMap<String, BTreeSet<usize>>,
}

impl TrackIndex {
    fn build(entries: Vec<IndexEntry>) -> Self {
        let mut index = Self::default();
        for (ordinal, entry) in entries.into_iter().enumerate() {
            for term in entry.keywords.iter().chain(entry.aliases.iter()) {
                index.postings.entry(term.clone()).or_default().insert(ordinal);
            }
            index.by_id.insert(entry.section_id.clone(), ordinal);
            index.entries.push(entry);
        }
        index
    }
}

/// Bare alphabetic tokens (3+ letters) and CJK runs (2-4 chars), lower-cased.
pub fn raw_tokens(text: &str) -> Vec<String> {
    RAW_TOKEN
        .find_iter(text)
        .chain(CJK_RUN.find_iter(text))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Fill in `keywords` and `aliases` for an entry from its title.
pub fn analyze_entry(entry: &mut IndexEntry, dictionary: &TermDictionary) {
    let keys = dictionary.concepts_in(&entry.title);
    entry.keywords = keys
        .iter()
        .map(|key| key.to_lowercase())
        .chain(raw_tokens(&entry.title))
        .collect();
    entry.aliases = keys
        .iter()
        .flat_map(|key| dictionary.aliases_for(key))
        .map(str::to_lowercase)
        .collect();
}

/// Query terms: raw tokens plus every dictionary surface (and its key)
/// found in the text. Lower-cased, first occurrence wins.
pub fn query_terms(text: &str, dictionary: &TermDictionary) -> Vec<String> {
    let mut terms: Vec<String> = raw_tokens(text);
    for (key, surface) in dictionary.surface_forms_in(text, QUERY_SURFACE_MIN_CHARS) {
        terms.push(surface.to_lowercase());
        terms.push(key.to_lowercase());
    }
    let mut seen = BTreeSet::new();
    terms.retain(|term| seen.insert(term.clone()));
    terms
}

/// Tiered contribution of one query term to one entry.
fn term_score(entry: &IndexEntry, title_lower: &str, term: &str) -> f32 {
    let mut score = 0.0;
    if title_lower.contains(term) {
        score += TITLE_CONTAINS;
    }
    if entry.keywords.contains(term) {
        score += KEYWORD_EQUALS;
    }
    if entry.aliases.contains(term) {
        score += ALIAS_EQUALS;
    }
    if entry.keywords.iter().any(|keyword| keyword.contains(term)) {
        score += KEYWORD_CONTAINS;
    }
    score
}

/// Inverted index over section titles, one sub-index per track.
pub struct LexicalIndex {
    tracks: RwLock<BTreeMap<Track, TrackIndex>>,
    cache: Mutex<LruCache<CacheKey, Vec<LexicalHit>>>,
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex")
            .field("tracks", &self.tracks().len())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl LexicalIndex {
    pub fn new(cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            tracks: RwLock::new(BTreeMap::new()),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Analyze and index `entries` as the whole content of `track`,
    /// replacing any previous build of that track. Returns the number of
    /// distinct terms.
    pub fn build(&self, track: Track, mut entries: Vec<IndexEntry>) -> usize {
        let dictionary = TermDictionary::for_track(track);
        for entry in &mut entries {
            analyze_entry(entry, dictionary);
        }
        let index = TrackIndex::build(entries);
        let terms = index.postings.len();
        let sections = index.entries.len();

        self.tracks.write().insert(track, index);
        self.cache.lock().clear();
        info!(%track, sections, terms, "built lexical index");
        terms
    }

    pub fn is_built(&self, track: Track) -> bool {
        self.tracks.read().contains_key(&track)
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.read().keys().copied().collect()
    }

    /// Total indexed sections across tracks.
    pub fn len(&self) -> usize {
        self.tracks.read().values().map(|index| index.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn term_count(&self) -> usize {
        self.tracks.read().values().map(|index| index.postings.len()).sum()
    }

    /// The analyzed entry for a section.
    pub fn entry(&self, section_id: &str) -> Option<IndexEntry> {
        let tracks = self.tracks.read();
        tracks.values().find_map(|index| {
            index
                .by_id
                .get(section_id)
                .map(|&ordinal| index.entries[ordinal].clone())
        })
    }

    /// Track a section is indexed under.
    pub fn track_of(&self, section_id: &str) -> Option<Track> {
        let tracks = self.tracks.read();
        tracks
            .iter()
            .find(|(_, index)| index.by_id.contains_key(section_id))
            .map(|(track, _)| *track)
    }

    /// Sections matching `text`, best first.
    ///
    /// With a track, only that track is searched and an unbuilt track is
    /// [`LinkError::IndexNotBuilt`]; without one, every built track is.
    pub fn query(&self, text: &str, track: Option<Track>) -> Result<Vec<LexicalHit>> {
        let key: CacheKey = (text.chars().take(CACHE_KEY_CHARS).collect(), track);
        if let Some(hits) = self.cache.lock().get(&key) {
            debug!(query = %key.0, "lexical cache hit");
            return Ok(hits.clone());
        }

        let hits = self.search(text, track)?;
        self.cache.lock().put(key, hits.clone());
        Ok(hits)
    }

    fn search(&self, text: &str, track: Option<Track>) -> Result<Vec<LexicalHit>> {
        let dictionary = track.map_or_else(TermDictionary::combined, TermDictionary::for_track);
        let terms = query_terms(text, dictionary);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let tracks = self.tracks.read();
        let selected: Vec<(Track, &TrackIndex)> = match track {
            Some(track) => vec![(
                track,
                tracks.get(&track).ok_or(LinkError::IndexNotBuilt(track))?,
            )],
            None => tracks.iter().map(|(track, index)| (*track, index)).collect(),
        };

        let norm = terms.len() as f32;
        let mut hits = Vec::new();
        for (track, index) in selected {
            let mut candidates = BTreeSet::new();
            for term in &terms {
                if let Some(postings) = index.postings.get(term) {
                    candidates.extend(postings.iter().copied());
                }
            }

            for ordinal in candidates {
                let entry = &index.entries[ordinal];
                let title_lower = entry.title.to_lowercase();
                let mut total = 0.0;
                let mut matched = Vec::new();
                for term in &terms {
                    let score = term_score(entry, &title_lower, term);
                    if score > 0.0 {
                        total += score;
                        matched.push(term.clone());
                    }
                }
                if total > 0.0 {
                    hits.push(LexicalHit {
                        section_id: entry.section_id.clone(),
                        track,
                        score: (total / norm).min(1.0),
                        matched_terms: matched,
                    });
                }
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(terms = ?terms, hits = hits.len(), "lexical query");
        Ok(hits)
    }

    /// Sections of the same track sharing keywords with `section_id`,
    /// scored by shared count over the section's own keyword count.
    pub fn related(&self, section_id: &str, max: usize) -> Vec<LexicalHit> {
        let tracks = self.tracks.read();
        let Some((track, index, source)) = tracks.iter().find_map(|(track, index)| {
            index
                .by_id
                .get(section_id)
                .map(|&ordinal| (*track, index, &index.entries[ordinal]))
        }) else {
            return Vec::new();
        };
        if source.keywords.is_empty() {
            return Vec::new();
        }

        let norm = source.keywords.len() as f32;
        let mut hits: Vec<LexicalHit> = index
            .entries
            .iter()
            .filter(|entry| entry.section_id != section_id)
            .filter_map(|entry| {
                let shared: Vec<String> = source
                    .keywords
                    .intersection(&entry.keywords)
                    .cloned()
                    .collect();
                (!shared.is_empty()).then(|| LexicalHit {
                    section_id: entry.section_id.clone(),
                    track,
                    score: (shared.len() as f32 / norm).min(1.0),
                    matched_terms: shared,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(max);
        hits
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}
