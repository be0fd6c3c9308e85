use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::runtime::Runtime;
use crate::validator::{unique, Validator};

// ─────────────────────────────────────────────────────────────────────────────
// Constants for validation rules
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum title length in bytes
pub const MAX_TITLE_BYTES: usize = 500;
/// Year of the earliest surviving motion picture
pub const EARLIEST_YEAR: i32 = 1888;
pub const MAX_GENRES: usize = 5;

/// Sort values accepted by `GET /v1/movies`
pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// A movie record. `id` and `version` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    pub version: i32,
}

impl Movie {
    /// Build an unsaved movie from a create request
    pub fn from_input(input: CreateMovieInput) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            title: input.title,
            year: input.year,
            runtime: input.runtime,
            genres: input.genres,
            version: 1,
        }
    }
}

/// Body of `POST /v1/movies`. Missing keys decode to empty values and are
/// reported by validation rather than by the decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CreateMovieInput {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// Presence of one key in a partial update body
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    /// Key absent from the body
    Missing,
    /// Key present with JSON `null`
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Missing
    }
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Patch::Missing)
    }
}

impl<T: Default> Patch<T> {
    /// Write the patched value into `target`. `Null` resets it to empty so
    /// whole-record validation can report the field.
    pub fn apply(self, target: &mut T) {
        match self {
            Patch::Missing => {}
            Patch::Null => *target = T::default(),
            Patch::Value(value) => *target = value,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

/// Body of `PATCH /v1/movies/:id`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovieInput {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub year: Patch<i32>,
    #[serde(default)]
    pub runtime: Patch<Runtime>,
    #[serde(default)]
    pub genres: Patch<Vec<String>>,
}

impl UpdateMovieInput {
    /// Apply the provided keys to `movie`, leaving the rest untouched
    pub fn apply_to(self, movie: &mut Movie) {
        self.title.apply(&mut movie.title);
        self.year.apply(&mut movie.year);
        self.runtime.apply(&mut movie.runtime);
        self.genres.apply(&mut movie.genres);
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    validate_movie_for_year(v, movie, Utc::now().year());
}

/// Same as `validate_movie` with an explicit notion of "this year"
pub fn validate_movie_for_year(v: &mut Validator, movie: &Movie, current_year: i32) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        format!("must not be more than {MAX_TITLE_BYTES} bytes long"),
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(
        movie.year >= EARLIEST_YEAR,
        "year",
        format!("must be {EARLIEST_YEAR} or later"),
    );
    v.check(movie.year <= current_year, "year", "must not be in the future");

    v.check(movie.runtime.minutes() != 0, "runtime", "must be provided");
    v.check(movie.runtime.minutes() > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        format!("must not contain more than {MAX_GENRES} genres"),
    );
    v.check(
        movie.genres.iter().all(|genre| !genre.is_empty()),
        "genres",
        "must not contain empty values",
    );
    v.check(unique(&movie.genres), "genres", "must not contain duplicate values");
}
