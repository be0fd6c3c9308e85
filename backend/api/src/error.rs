use axum::{
    http::{HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use shared::{DataError, FieldErrors};
use uuid::Uuid;

use crate::metrics;
use crate::response::{Envelope, JsonResponse, SERVER_ERROR_MESSAGE};
use crate::validation::DecodeError;

const CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Every way a request can fail, as seen by the client
#[derive(Debug)]
pub enum ApiError {
    /// 400, malformed body; message is the decoder classification
    BadRequest(String),
    NotFound,
    MethodNotAllowed(Method),
    EditConflict,
    FailedValidation(FieldErrors),
    RateLimited,
    /// 500; the cause has already been logged
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> Envelope {
        match self {
            ApiError::BadRequest(message) => Envelope::of("error", message),
            ApiError::NotFound => {
                Envelope::of("error", "the requested resource could not be found")
            }
            ApiError::MethodNotAllowed(method) => Envelope::of(
                "error",
                &format!("the {method} method is not supported for this resource"),
            ),
            ApiError::EditConflict => Envelope::of(
                "error",
                "unable to update the record due to an edit conflict, please try again",
            ),
            ApiError::FailedValidation(errors) => Envelope::of("error", errors),
            ApiError::RateLimited => Envelope::of("error", "rate limit exceeded"),
            ApiError::Internal => Envelope::of("error", SERVER_ERROR_MESSAGE),
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::RecordNotFound => ApiError::NotFound,
            DataError::EditConflict => {
                metrics::MOVIE_EDIT_CONFLICTS.inc();
                ApiError::EditConflict
            }
            DataError::UnsafeSort(sort) => {
                tracing::error!(sort = %sort, "sort value reached the store without passing the safelist");
                ApiError::Internal
            }
            DataError::Timeout => {
                tracing::error!("database query timed out");
                ApiError::Internal
            }
            DataError::Database(err) => {
                tracing::error!(error = ?err, "database operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        metrics::VALIDATION_FAILURES.with_label_values(&["body"]).inc();
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(correlation_id = %correlation_id, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(correlation_id = %correlation_id, status = status.as_u16(), "request rejected");
        }

        let mut response = JsonResponse::new(status, self.envelope()).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(CORRELATION_ID, value);
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_data_errors_map_to_distinct_classes() {
        assert!(matches!(ApiError::from(DataError::RecordNotFound), ApiError::NotFound));
        assert!(matches!(ApiError::from(DataError::EditConflict), ApiError::EditConflict));
        assert!(matches!(ApiError::from(DataError::Timeout), ApiError::Internal));
        assert!(matches!(
            ApiError::from(DataError::UnsafeSort("x".into())),
            ApiError::Internal
        ));
    }

    #[tokio::test]
    async fn test_validation_error_body_is_field_map() {
        let mut errors = BTreeMap::new();
        errors.insert("year".to_string(), "must be provided".to_string());
        errors.insert("title".to_string(), "must be provided".to_string());

        let response = ApiError::FailedValidation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.headers().contains_key(CORRELATION_ID));

        let body = body_json(response).await;
        assert_eq!(body["error"]["year"], "must be provided");
        assert_eq!(body["error"]["title"], "must be provided");
    }

    #[tokio::test]
    async fn test_method_not_allowed_names_method() {
        let response = ApiError::MethodNotAllowed(Method::PUT).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "the PUT method is not supported for this resource");
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let err = ApiError::from(DataError::Database(sqlx::Error::PoolTimedOut));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], SERVER_ERROR_MESSAGE);
    }
}
