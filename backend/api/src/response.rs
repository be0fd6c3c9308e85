//! Uniform JSON envelope for every response body.
//!
//! Bodies are a single top-level object (`{"movie": ...}`, `{"error": ...}`),
//! pretty-printed with tab indentation and terminated by a newline. A value
//! that fails to serialize turns into a 500 error envelope; if that cannot be
//! produced either, the response is a bare 500 with no body.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Named payloads collected into one JSON object
#[derive(Debug)]
pub struct Envelope {
    entries: Result<Map<String, Value>, serde_json::Error>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            entries: Ok(Map::new()),
        }
    }

    /// Envelope holding a single `key`
    pub fn of<T: Serialize + ?Sized>(key: &str, value: &T) -> Self {
        Self::new().with(key, value)
    }

    /// Add `key`. The first serialization failure is kept and reported at render time.
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        if let Ok(entries) = &mut self.entries {
            match serde_json::to_value(value) {
                Ok(value) => {
                    entries.insert(key.to_string(), value);
                }
                Err(err) => self.entries = Err(err),
            }
        }
        self
    }

    /// Tab-indented JSON followed by a newline
    pub fn encode(self) -> Result<Vec<u8>, serde_json::Error> {
        let entries = self.entries?;
        let mut buffer = Vec::with_capacity(128);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        entries.serialize(&mut serializer)?;
        buffer.push(b'\n');
        Ok(buffer)
    }
}

/// An enveloped body with its status and any extra headers
#[derive(Debug)]
pub struct JsonResponse {
    status: StatusCode,
    envelope: Envelope,
    headers: HeaderMap,
}

impl JsonResponse {
    pub fn new(status: StatusCode, envelope: Envelope) -> Self {
        Self {
            status,
            envelope,
            headers: HeaderMap::new(),
        }
    }

    pub fn ok(envelope: Envelope) -> Self {
        Self::new(StatusCode::OK, envelope)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        match self.envelope.encode() {
            Ok(body) => build(self.status, self.headers, body),
            Err(err) => {
                tracing::error!(error = %err, status = %self.status, "failed to encode response body");
                server_error_fallback()
            }
        }
    }
}

fn build(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let response_headers = response.headers_mut();
    for (name, value) in headers.iter() {
        response_headers.insert(name.clone(), value.clone());
    }
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

/// 500 error envelope, or a bare 500 if even that cannot be encoded
pub fn server_error_fallback() -> Response {
    finish_fallback(Envelope::of("error", SERVER_ERROR_MESSAGE).encode())
}

fn finish_fallback(encoded: Result<Vec<u8>, serde_json::Error>) -> Response {
    match encoded {
        Ok(body) => build(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), body),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode fallback error body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
