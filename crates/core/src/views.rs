//! Derived views over cached records.
//!
//! Everything here is a pure function of its inputs. Randomness comes in as
//! an explicit `Rng` so callers control seeding.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::movie::{normalize_for_search, Movie};
use crate::overlay::OverlaySnapshot;

/// Top `limit` genre tags by occurrence count. Ties keep first-seen order.
pub fn significant_genres<'a, I>(records: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a Movie>,
{
    let mut counts: IndexMap<&'a str, usize> = IndexMap::new();
    for movie in records {
        for genre in &movie.genres {
            *counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable sort, so equal counts stay in insertion order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(limit)
        .map(|(genre, _)| genre.to_string())
        .collect()
}

/// Random sample of at most `limit` records tagged with `genre`.
pub fn movies_for_genre<'a, I, R>(records: I, genre: &str, limit: usize, rng: &mut R) -> Vec<Movie>
where
    I: IntoIterator<Item = &'a Movie>,
    R: Rng + ?Sized,
{
    let matching: Vec<Movie> = records
        .into_iter()
        .filter(|movie| movie.has_genre(genre))
        .cloned()
        .collect();
    sample(matching, limit, rng)
}

/// Candidate pool for recommendations.
///
/// Without any overlay signal the pool is every record. Otherwise it is the
/// records sharing a genre tag with the watchlist and watched history,
/// minus the history itself. An empty restricted pool falls back to all
/// records outside the history.
pub fn recommendation_pool(records: &[Movie], snapshot: &OverlaySnapshot) -> Vec<Movie> {
    if snapshot.has_no_signal() {
        return records.to_vec();
    }

    let in_history = |movie: &Movie| snapshot.in_watchlist(movie.id) || snapshot.is_watched(movie.id);

    let history_genres: Vec<String> = records
        .iter()
        .filter(|movie| in_history(*movie))
        .flat_map(|movie| movie.genres.iter().cloned())
        .collect();

    let unseen = records.iter().filter(|movie| !in_history(*movie));

    let related: Vec<Movie> = unseen
        .clone()
        .filter(|movie| movie.shares_genre_with(&history_genres))
        .cloned()
        .collect();

    if related.is_empty() {
        unseen.cloned().collect()
    } else {
        related
    }
}

/// Shuffle `pool` and keep at most `limit` records.
pub fn sample<R>(mut pool: Vec<Movie>, limit: usize, rng: &mut R) -> Vec<Movie>
where
    R: Rng + ?Sized,
{
    pool.shuffle(rng);
    pool.truncate(limit);
    pool
}

/// Records with a stored resume position.
pub fn continue_watching<'a, I>(records: I) -> Vec<Movie>
where
    I: IntoIterator<Item = &'a Movie>,
{
    records
        .into_iter()
        .filter(|movie| movie.resume_minutes > 0)
        .cloned()
        .collect()
}

/// Local title match. A blank query matches nothing.
pub fn search_local<'a, I>(records: I, query: &str) -> Vec<Movie>
where
    I: IntoIterator<Item = &'a Movie>,
{
    let needle = normalize_for_search(query);
    if needle.is_empty() {
        return Vec::new();
    }
    records
        .into_iter()
        .filter(|movie| normalize_for_search(&movie.title).contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn movie(id: i64, title: &str, genres: &[&str]) -> Movie {
        Movie::new(id, title).with_genres(genres.iter().copied())
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_significant_genres_ranked_with_stable_ties() {
        let records = vec![
            movie(1, "A", &["Comedy", "Drama"]),
            movie(2, "B", &["Drama", "Horror"]),
            movie(3, "C", &["Horror", "Drama", "War"]),
            movie(4, "D", &["Western"]),
        ];

        let genres = significant_genres(&records, 3);
        assert_eq!(genres, vec!["Drama", "Horror", "Comedy"]);
    }

    #[test]
    fn test_significant_genres_limit_five() {
        let records = vec![movie(
            1,
            "A",
            &["G1", "G2", "G3", "G4", "G5", "G6", "G7"],
        )];
        assert_eq!(significant_genres(&records, 5).len(), 5);
    }

    #[test]
    fn test_movies_for_genre_filters_and_caps() {
        let mut records: Vec<Movie> = (0..30).map(|i| movie(i, "x", &["Sci-Fi"])).collect();
        records.push(movie(100, "y", &["Drama"]));

        let picked = movies_for_genre(&records, "sci", 10, &mut rng());
        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|m| m.has_genre("Sci-Fi")));
    }

    #[test]
    fn test_movies_for_genre_fewer_than_limit() {
        let records = vec![movie(1, "x", &["Drama"]), movie(2, "y", &["Comedy"])];
        let picked = movies_for_genre(&records, "drama", 10, &mut rng());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, 1);
    }

    #[test]
    fn test_recommendation_pool_without_signal_is_everything() {
        let records = vec![movie(1, "x", &["Drama"]), movie(2, "y", &["Comedy"])];
        let pool = recommendation_pool(&records, &OverlaySnapshot::default());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_recommendation_pool_shares_history_genres() {
        let records = vec![
            movie(1, "seen", &["Drama"]),
            movie(2, "related", &["drama", "War"]),
            movie(3, "unrelated", &["Comedy"]),
            movie(4, "listed", &["Horror"]),
        ];
        let mut snapshot = OverlaySnapshot::default();
        snapshot.watched.insert(1);
        snapshot.watchlist.insert(4);

        let ids: Vec<i64> = recommendation_pool(&records, &snapshot)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_recommendation_pool_falls_back_without_overlap() {
        let records = vec![
            movie(1, "seen", &["Documentary"]),
            movie(2, "a", &["Comedy"]),
            movie(3, "b", &["Action"]),
        ];
        let mut snapshot = OverlaySnapshot::default();
        snapshot.watched.insert(1);

        let ids: Vec<i64> = recommendation_pool(&records, &snapshot)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_sample_is_seeded() {
        let pool: Vec<Movie> = (0..50).map(|i| movie(i, "x", &[])).collect();
        let a = sample(pool.clone(), 20, &mut rng());
        let b = sample(pool, 20, &mut rng());
        assert_eq!(a.len(), 20);
        let ids_a: Vec<i64> = a.iter().map(|m| m.id).collect();
        let ids_b: Vec<i64> = b.iter().map(|m| m.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_continue_watching() {
        let mut started = movie(1, "x", &[]);
        started.resume_minutes = 12;
        let records = vec![started, movie(2, "y", &[])];

        let ids: Vec<i64> = continue_watching(&records).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_search_local_normalizes() {
        let records = vec![
            movie(1, "Amélie", &[]),
            movie(2, "Spider-Man: Homecoming", &[]),
            movie(3, "Heat", &[]),
        ];

        let ids: Vec<i64> = search_local(&records, "AMELIE").iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1]);

        let ids: Vec<i64> = search_local(&records, "spiderman").iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);

        assert!(search_local(&records, "  ").is_empty());
    }
}
