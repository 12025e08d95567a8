//! SQL text for catalog operations.
//!
//! Every string interpolated into a statement goes through
//! [`quote_literal`], which doubles single quotes. That is the only injection
//! defense on this path, so nothing user- or data-controlled may bypass it.

use crate::movie::{normalize_for_search, SEARCH_SEPARATORS};

/// Remote table holding the catalog.
pub const MOVIES_TABLE: &str = "movies";

/// Accented characters folded by the remote title match. The local side
/// folds through Unicode decomposition; this table covers what SQLite's
/// ASCII-only `LOWER` leaves behind.
const TITLE_FOLDS: &[(&str, &str)] = &[
    ("á", "a"), ("à", "a"), ("ä", "a"), ("â", "a"), ("ã", "a"),
    ("Á", "a"), ("À", "a"), ("Ä", "a"), ("Â", "a"), ("Ã", "a"),
    ("é", "e"), ("è", "e"), ("ë", "e"), ("ê", "e"),
    ("É", "e"), ("È", "e"), ("Ë", "e"), ("Ê", "e"),
    ("í", "i"), ("ì", "i"), ("ï", "i"), ("î", "i"),
    ("Í", "i"), ("Ì", "i"), ("Ï", "i"), ("Î", "i"),
    ("ó", "o"), ("ò", "o"), ("ö", "o"), ("ô", "o"), ("õ", "o"),
    ("Ó", "o"), ("Ò", "o"), ("Ö", "o"), ("Ô", "o"), ("Õ", "o"),
    ("ú", "u"), ("ù", "u"), ("ü", "u"), ("û", "u"),
    ("Ú", "u"), ("Ù", "u"), ("Ü", "u"), ("Û", "u"),
    ("ñ", "n"), ("Ñ", "n"), ("ç", "c"), ("Ç", "c"),
];

/// Render `value` as a single-quoted SQL literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape LIKE wildcards so `%` and `_` in `value` match literally. Pair
/// with `ESCAPE '\'`.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Synopsis column for a language: `overview` for English, otherwise
/// `overview_<lang>`. Non-alphanumeric characters are dropped so the
/// identifier cannot carry SQL.
pub fn synopsis_column(language: &str) -> String {
    let lang: String = language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    if lang.is_empty() || lang == "en" {
        "overview".to_string()
    } else {
        format!("overview_{}", lang)
    }
}

fn select_from(language: &str) -> String {
    format!(
        "SELECT id, title, runtime, poster_path, genres, {} AS overview FROM {}",
        synopsis_column(language),
        MOVIES_TABLE
    )
}

/// One page in storage order.
pub fn page(language: &str, limit: usize, offset: usize) -> String {
    format!("{} LIMIT {} OFFSET {}", select_from(language), limit, offset)
}

/// Random sample of movies tagged with `genre` (case-insensitive substring).
pub fn by_genre(language: &str, genre: &str, count: usize) -> String {
    let pattern = quote_literal(&format!("%{}%", escape_like(&genre.to_lowercase())));
    format!(
        "{} WHERE LOWER(genres) LIKE {} ESCAPE '\\' ORDER BY RANDOM() LIMIT {}",
        select_from(language),
        pattern,
        count
    )
}

/// Normalized title substring search, paginated.
pub fn search_title(language: &str, query: &str, limit: usize, offset: usize) -> String {
    let pattern = quote_literal(&format!("%{}%", escape_like(&normalize_for_search(query))));
    format!(
        "{} WHERE {} LIKE {} ESCAPE '\\' LIMIT {} OFFSET {}",
        select_from(language),
        normalized_title_expr(),
        pattern,
        limit,
        offset
    )
}

/// Unordered random sample.
pub fn random(language: &str, count: usize) -> String {
    format!("{} ORDER BY RANDOM() LIMIT {}", select_from(language), count)
}

/// Movies with the given IDs. IDs are integers, so no quoting is involved.
pub fn by_ids(language: &str, ids: &[i64]) -> String {
    let list = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} WHERE id IN ({})", select_from(language), list)
}

/// SQL expression mirroring [`normalize_for_search`] on the `title` column.
fn normalized_title_expr() -> String {
    let mut expr = "LOWER(title)".to_string();
    for (from, to) in TITLE_FOLDS {
        expr = format!("REPLACE({}, {}, {})", expr, quote_literal(from), quote_literal(to));
    }
    for sep in SEARCH_SEPARATORS {
        expr = format!("REPLACE({}, {}, '')", expr, quote_literal(&sep.to_string()));
    }
    expr
}
