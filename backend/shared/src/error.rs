use thiserror::Error;

/// Outcome classes of a persistence call. Handlers match on this exhaustively.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("record not found")]
    RecordNotFound,
    #[error("edit conflict")]
    EditConflict,
    /// A sort value reached the store without passing the safelist check
    #[error("unsafe sort parameter: {0}")]
    UnsafeSort(String),
    #[error("database query timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
