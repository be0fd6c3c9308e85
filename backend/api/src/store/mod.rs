//! Movie persistence.
//!
//! The store is the only arbiter of the optimistic-concurrency check: an
//! update succeeds only if the stored version still equals the version the
//! caller read, and that comparison happens inside a single atomic write.

use async_trait::async_trait;
use shared::{DataError, Filters, Metadata, Movie};

pub mod memory;
pub mod postgres;

pub use memory::MemoryMovieStore;
pub use postgres::PgMovieStore;

#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Insert `movie`, filling in its `id`, `created_at` and `version`
    async fn insert(&self, movie: &mut Movie) -> Result<(), DataError>;

    /// Non-positive ids are `RecordNotFound` without a lookup
    async fn get(&self, id: i64) -> Result<Movie, DataError>;

    /// Write `movie` if its stored version still equals `movie.version`.
    /// On success `movie.version` holds the new version. Zero matching
    /// rows (changed or deleted since read) is `EditConflict`.
    async fn update(&self, movie: &mut Movie) -> Result<(), DataError>;

    async fn delete(&self, id: i64) -> Result<(), DataError>;

    /// One page of movies whose title matches `title` (all words, empty
    /// matches everything) and whose genres include every entry of `genres`
    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DataError>;

    /// Liveness probe of the backing storage
    async fn ping(&self) -> Result<(), DataError>;
}
