//! Strict JSON body decoding.
//!
//! Exactly one JSON value, no keys the target type does not declare, at most
//! `MAX_BODY_BYTES` bytes. Each failure mode maps to its own client-facing
//! message instead of a generic parse error.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequest, Request},
    http::header::CONTENT_LENGTH,
};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use thiserror::Error;

use crate::error::ApiError;

/// Upper bound on a request body (1 MiB)
pub const MAX_BODY_BYTES: usize = 1_048_576;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("body must not be empty")]
    Empty,
    #[error("body contains badly-formed JSON (at character {0})")]
    Syntax(usize),
    #[error("body contains badly-formed JSON")]
    UnexpectedEof,
    #[error("body contains incorrect JSON type for field {0:?}")]
    FieldType(String),
    #[error("body contains incorrect JSON type (at character {0})")]
    Type(usize),
    #[error("body contains unknown key {0}")]
    UnknownKey(String),
    #[error("body must not be larger than {0} bytes")]
    TooLarge(usize),
    #[error("body must only contain a single JSON value")]
    TrailingData,
    #[error("failed to read request body: {0}")]
    Read(String),
    /// A data error that fits none of the classes above, surfaced as-is
    #[error("{0}")]
    Other(String),
}

/// Read at most `limit` bytes of `body`
pub async fn read_limited(body: Body, limit: usize) -> Result<Vec<u8>, DecodeError> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| DecodeError::Read(err.to_string()))?;
        if buffer.len() + chunk.len() > limit {
            return Err(DecodeError::TooLarge(limit));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

/// Decode exactly one JSON value of type `T` from `body`
pub fn decode_strict<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let value: T = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|err| classify(body, err))?;

    deserializer.end().map_err(|_| DecodeError::TrailingData)?;

    Ok(value)
}

/// Read and strictly decode a request body
pub async fn decode_body<T: DeserializeOwned>(body: Body) -> Result<T, DecodeError> {
    let bytes = read_limited(body, MAX_BODY_BYTES).await?;
    decode_strict(&bytes)
}

fn classify(body: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> DecodeError {
    let field = top_level_field(err.path());
    let inner = err.into_inner();
    let offset = byte_offset(body, inner.line(), inner.column());

    match inner.classify() {
        Category::Eof => DecodeError::UnexpectedEof,
        Category::Syntax => DecodeError::Syntax(offset),
        Category::Data => {
            let message = strip_position(&inner.to_string());
            if let Some(key) = unknown_key(&message) {
                DecodeError::UnknownKey(key)
            } else if message.starts_with("invalid type:") || message.starts_with("invalid value:") {
                match field {
                    Some(field) => DecodeError::FieldType(field),
                    None => DecodeError::Type(offset),
                }
            } else {
                DecodeError::Other(message)
            }
        }
        // Decoding from an in-memory slice performs no I/O. Reaching this arm
        // is a server bug, not bad input: abort the request.
        Category::Io => panic!("strict decoder misuse: {inner}"),
    }
}

/// Name of the top-level key a type error sits under (`genres` for `genres[0]`)
fn top_level_field(path: &serde_path_to_error::Path) -> Option<String> {
    match path.iter().next()? {
        serde_path_to_error::Segment::Map { key } => Some(key.clone()),
        _ => None,
    }
}

/// serde_json reports 1-based line/column; convert to a 1-based byte offset
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = body
        .split(|byte| *byte == b'\n')
        .take(line.saturating_sub(1))
        .map(|line| line.len() + 1)
        .sum();
    (line_start + column).min(body.len())
}

fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(index) => message[..index].to_string(),
        None => message.to_string(),
    }
}

fn unknown_key(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Body extractor applying `decode_strict`; rejects with a 400 `ApiError`
pub struct StrictJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|length| length > MAX_BODY_BYTES) {
            return Err(DecodeError::TooLarge(MAX_BODY_BYTES).into());
        }

        let value = decode_body(req.into_body()).await?;
        Ok(StrictJson(value))
    }
}
