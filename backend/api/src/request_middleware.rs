use std::any::Any;
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::error::ApiError;
use crate::metrics;

/// Opens a span carrying method and URL for everything logged while the
/// request is in flight, then records the outcome and latency.
pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();

    let span = tracing::info_span!("request", %method, %uri);
    let response = next.run(req).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();

    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), &path, &status.to_string()])
        .inc();
    metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), &path])
        .observe(elapsed.as_secs_f64());

    span.in_scope(|| {
        tracing::info!("{method} {uri} {status} {}ms", elapsed.as_millis());
    });

    response
}

/// Panic recovery for `CatchPanicLayer`: a 500 envelope, and the connection is
/// closed after the response is written.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };
    tracing::error!(panic = %detail, "request handler panicked");

    let mut response = ApiError::Internal.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_panic_response_is_enveloped_and_closes() {
        let response = handle_panic(Box::new("strict decoder misuse: boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["error"],
            "the server encountered a problem and could not process your request"
        );
    }

    #[test]
    fn test_panic_with_owned_message() {
        let response = handle_panic(Box::new(String::from("owned")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
