//! Catalog record type and the small parsing helpers shared by the query
//! client and the cache.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Characters dropped from titles and queries before matching.
pub const SEARCH_SEPARATORS: [char; 5] = [' ', '-', '_', ':', '.'];

/// A movie known to the catalog.
///
/// Identity is the `id` alone: two records with the same ID are the same
/// movie whatever their other fields say. The `watched`, `in_watchlist` and
/// `resume_minutes` fields mirror the overlay and are recomputed on every
/// merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    /// Database row ID, or a title hash when the row carried none.
    pub id: i64,
    pub title: String,
    /// Absolute poster URL (may be empty).
    pub poster_url: String,
    /// Synopsis in the current language.
    pub synopsis: String,
    /// Formatted runtime, e.g. "2h 5m".
    pub duration: String,
    /// Genre tags, order irrelevant.
    pub genres: Vec<String>,
    /// Skeleton record shown while loading. Always has a negative ID.
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub watched: bool,
    #[serde(default)]
    pub in_watchlist: bool,
    #[serde(default)]
    pub resume_minutes: u32,
}

impl Movie {
    /// Create a record with no overlay state.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            poster_url: String::new(),
            synopsis: String::new(),
            duration: String::new(),
            genres: Vec::new(),
            loading: false,
            watched: false,
            in_watchlist: false,
            resume_minutes: 0,
        }
    }

    /// Create a record whose ID is derived from its title.
    pub fn from_title(title: impl Into<String>) -> Self {
        let title = title.into();
        Self::new(title_hash_id(&title), title)
    }

    /// Loading placeholder number `index` (0-based). IDs are -1, -2, ...
    pub fn placeholder(index: usize) -> Self {
        let mut movie = Self::new(-(index as i64) - 1, "");
        movie.loading = true;
        movie
    }

    /// Builder-style genre setter.
    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive substring match of `keyword` against any genre tag.
    ///
    /// `"sci"` matches a record tagged `"Sci-Fi"`.
    pub fn has_genre(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.genres
            .iter()
            .any(|g| g.to_lowercase().contains(&keyword))
    }

    /// True if any tag equals one of `tags`, ignoring case.
    pub fn shares_genre_with<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let own: Vec<String> = self.genres.iter().map(|g| g.to_lowercase()).collect();
        tags.into_iter().any(|t| own.contains(&t.to_lowercase()))
    }
}

impl PartialEq for Movie {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Movie {}

impl Hash for Movie {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Deterministic, non-negative ID for a record that arrived without one.
pub fn title_hash_id(title: &str) -> i64 {
    let digest = Sha256::digest(title.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) & i64::MAX as u64) as i64
}

/// Format a runtime in minutes: 125 -> "2h 5m", 45 -> "45m".
///
/// Zero (unknown runtime) formats as an empty string.
pub fn format_duration(minutes: u32) -> String {
    if minutes == 0 {
        return String::new();
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours == 0 {
        format!("{}m", rest)
    } else {
        format!("{}h {}m", hours, rest)
    }
}

/// Normalize a title or query for matching: lower-case, diacritics folded,
/// separators and whitespace removed. "Amélie - Le Film" -> "amelielefilm".
pub fn normalize_for_search(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !c.is_whitespace() && !SEARCH_SEPARATORS.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a delimited genre cell into trimmed tags.
///
/// Accepts `Action, Drama`, `["Action", "Drama"]` and `['Action','Drama']`.
pub fn split_genres(raw: &str) -> Vec<String> {
    let inner = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');

    inner
        .split(',')
        .map(|part| part.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}
