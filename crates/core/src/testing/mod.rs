//! Testing utilities and mock implementations.
//!
//! This module provides a mock catalog source and record fixtures, allowing
//! the refresh cycle to be exercised without a remote catalog.
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_core::testing::{fixtures, MockCatalogSource};
//!
//! let source = MockCatalogSource::new();
//! source.set_catalog(fixtures::movies_with_genres(1, 50, &["Drama"])).await;
//!
//! // Use in CatalogService::new...
//! ```

mod mock_catalog_source;

pub use mock_catalog_source::{MockCatalogSource, MockOperation, RecordedCatalogCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::movie::{format_duration, Movie};

    /// The default backfill target genres.
    pub const DEFAULT_GENRES: [&str; 6] = [
        "Action",
        "Drama",
        "Comedy",
        "Romance",
        "Documentary",
        "Adventure",
    ];

    /// Create a test movie with reasonable defaults.
    pub fn movie(id: i64, title: &str, genres: &[&str]) -> Movie {
        let mut movie = Movie::new(id, title).with_genres(genres.iter().copied());
        movie.synopsis = format!("A film called {}.", title);
        movie.duration = format_duration(90 + (id.unsigned_abs() % 60) as u32);
        movie.poster_url = format!("https://image.tmdb.org/t/p/w500/{}.jpg", id);
        movie
    }

    /// `count` movies with consecutive IDs from `first_id`, each tagged
    /// with every genre in `genres`.
    pub fn movies_with_genres(first_id: i64, count: usize, genres: &[&str]) -> Vec<Movie> {
        (0..count as i64)
            .map(|i| {
                let id = first_id + i;
                movie(id, &format!("Movie {}", id), genres)
            })
            .collect()
    }
}
