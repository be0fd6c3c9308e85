//! In-process movie store.
//!
//! One lock guards the whole table, so the version comparison and the write
//! in `update` happen atomically, exactly like the conditional `UPDATE` of
//! the Postgres store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use shared::{DataError, Filters, Metadata, Movie, SortDirection};

use super::MovieStore;

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Movie>,
}

#[derive(Default)]
pub struct MemoryMovieStore {
    table: RwLock<Table>,
}

impl MemoryMovieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn title_matches(title: &str, query: &str) -> bool {
    let wanted = words(query);
    if wanted.is_empty() {
        return true;
    }
    let have = words(title);
    wanted.iter().all(|word| have.contains(word))
}

const SORTABLE_COLUMNS: &[&str] = &["id", "title", "year", "runtime"];

fn compare(column: &str, a: &Movie, b: &Movie) -> Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "runtime" => a.runtime.cmp(&b.runtime),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl MovieStore for MemoryMovieStore {
    async fn insert(&self, movie: &mut Movie) -> Result<(), DataError> {
        let mut table = self.table.write();
        table.last_id += 1;

        movie.id = table.last_id;
        movie.created_at = Utc::now();
        movie.version = 1;
        table.rows.insert(movie.id, movie.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Movie, DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        self.table
            .read()
            .rows
            .get(&id)
            .cloned()
            .ok_or(DataError::RecordNotFound)
    }

    async fn update(&self, movie: &mut Movie) -> Result<(), DataError> {
        let mut table = self.table.write();
        let Some(stored) = table.rows.get_mut(&movie.id) else {
            return Err(DataError::EditConflict);
        };
        if stored.version != movie.version {
            return Err(DataError::EditConflict);
        }

        stored.title = movie.title.clone();
        stored.year = movie.year;
        stored.runtime = movie.runtime;
        stored.genres = movie.genres.clone();
        stored.version += 1;

        movie.version = stored.version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DataError> {
        if id < 1 {
            return Err(DataError::RecordNotFound);
        }
        match self.table.write().rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DataError::RecordNotFound),
        }
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
        if !SORTABLE_COLUMNS.contains(&order.column) {
            return Err(DataError::UnsafeSort(filters.sort.clone()));
        }

        let mut matching: Vec<Movie> = self
            .table
            .read()
            .rows
            .values()
            .filter(|movie| title_matches(&movie.title, title))
            .filter(|movie| genres.iter().all(|genre| movie.genres.contains(genre)))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let primary = compare(order.column, a, b);
            let primary = match order.direction {
                SortDirection::Ascending => primary,
                SortDirection::Descending => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });

        let matched = matching.len() as i64;
        let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filters.limit()).unwrap_or(0);
        let page: Vec<Movie> = matching.into_iter().skip(offset).take(limit).collect();

        // The count travels with the returned rows, as with `count(*) OVER()`
        let total_records = if page.is_empty() { 0 } else { matched };

        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((page, metadata))
    }

    async fn ping(&self) -> Result<(), DataError> {
        Ok(())
    }
}
