/// PostgreSQL-backed movie store
/// Every call is a single round-trip bounded by the configured query timeout

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{DataError, Filters, Metadata, Movie};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use tracing::debug;

use super::MovieStore;

#[derive(Clone)]
pub struct PgMovieStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgMovieStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        PgMovieStore { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, query: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(result) => result.map_err(DataError::from),
            Err(_) => Err(DataError::Timeout),
        }
    }
}

#[async_trait]
impl MovieStore for PgMovieStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DataError> {
        let (id, created_at, version): (i64, DateTime<Utc>, i32) = self
            .bounded(
                sqlx::query_as(
                    r#"
                    INSERT INTO movies (title, year, runtime, genres)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, created_at, version
                    "#,
                )
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime)
                .bind(&movie.genres)
                .fetch_one(&self.pool),
            )
            .await?;

        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        debug!(movie_id = id, "movie inserted");
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }

        self.bounded(
            sqlx::query_as::<_, Movie>(
                r#"
                SELECT id, created_at, title, year, runtime, genres, version
                FROM movies
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(DataError::RecordNotFound)
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DataError> {
        let version: Option<i32> = self
            .bounded(
                sqlx::query_scalar(
                    r#"
                    UPDATE movies
                    SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
                    WHERE id = $5 AND version = $6
                    RETURNING version
                    "#,
                )
                .bind(&movie.title)
                .bind(movie.year)
                .bind(movie.runtime)
                .bind(&movie.genres)
                .bind(movie.id)
                .bind(movie.version)
                .fetch_optional(&self.pool),
            )
            .await?;

        match version {
            Some(version) => {
                movie.version = version;
                Ok(())
            }
            None => Err(DataError::EditConflict),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }

        let result = self
            .bounded(
                sqlx::query("DELETE FROM movies WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::RecordNotFound);
        }
        Ok(())
    }

    async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, Metadata), DataError> {
        let order = filters
            .order_by()
            .ok_or_else(|| DataError::UnsafeSort(filters.sort.clone()))?;

        // Column and direction are 'static strings from the safelist
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, id, created_at, title, year, runtime, genres, version
            FROM movies
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
            AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {} {}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            order.column,
            order.direction.as_sql()
        );

        let rows: Vec<PgRow> = self
            .bounded(
                sqlx::query(&query)
                    .bind(title)
                    .bind(genres)
                    .bind(filters.limit())
                    .bind(filters.offset())
                    .fetch_all(&self.pool),
            )
            .await?;

        let mut total_records = 0_i64;
        let mut movies = Vec::with_capacity(rows.len());
        for row in &rows {
            total_records = row.try_get("total_records")?;
            movies.push(Movie::from_row(row)?);
        }

        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((movies, metadata))
    }

    async fn ping(&self) -> Result<(), DataError> {
        self.bounded(sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool))
            .await
            .map(|_| ())
    }
}
