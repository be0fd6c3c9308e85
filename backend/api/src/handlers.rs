use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use shared::{
    validate_filters, validate_movie, CreateMovieInput, FieldErrors, Filters, Movie,
    UpdateMovieInput, Validator, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MOVIE_SORT_SAFELIST,
};

use crate::{
    error::{ApiError, ApiResult},
    metrics,
    response::{Envelope, JsonResponse},
    state::AppState,
    validation::{decode_body, read_csv, read_int, read_string, QueryParams, StrictJson},
};

fn map_query_rejection(err: QueryRejection) -> ApiError {
    ApiError::BadRequest(format!("invalid query parameters: {}", err.body_text()))
}

fn failed_validation(errors: FieldErrors) -> ApiError {
    metrics::VALIDATION_FAILURES
        .with_label_values(&["fields"])
        .inc();
    ApiError::FailedValidation(errors)
}

/// Path ids must be positive integers; anything else is reported as not found
fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

fn check_movie(movie: &Movie) -> ApiResult<()> {
    let mut v = Validator::new();
    validate_movie(&mut v, movie);
    v.finish().map_err(failed_validation)
}

pub async fn health_check(State(state): State<AppState>) -> JsonResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let system_info = json!({
        "environment": state.environment.to_string(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
    });

    match state.movies.ping().await {
        Ok(()) => JsonResponse::ok(
            Envelope::of("status", "available").with("system_info", &system_info),
        ),
        Err(err) => {
            tracing::warn!(error = %err, uptime_secs = uptime, "health check degraded, storage unreachable");
            JsonResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                Envelope::of("status", "degraded").with("system_info", &system_info),
            )
        }
    }
}

/// GET /v1/movies?title=&genres=&page=&page_size=&sort=
pub async fn list_movies(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> ApiResult<JsonResponse> {
    let Query(qs) = params.map_err(map_query_rejection)?;
    let mut v = Validator::new();

    let title = read_string(&qs, "title", "");
    let genres = read_csv(&qs, "genres", &[]);
    let filters = Filters {
        page: read_int(&qs, "page", DEFAULT_PAGE, &mut v),
        page_size: read_int(&qs, "page_size", DEFAULT_PAGE_SIZE, &mut v),
        sort: read_string(&qs, "sort", "id"),
        sort_safelist: MOVIE_SORT_SAFELIST,
    };

    validate_filters(&mut v, &filters);
    v.finish().map_err(failed_validation)?;

    let (movies, metadata) = state.movies.get_all(&title, &genres, &filters).await?;

    Ok(JsonResponse::ok(
        Envelope::of("movies", &movies).with("metadata", &metadata),
    ))
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CreateMovieInput>,
) -> ApiResult<JsonResponse> {
    let mut movie = Movie::from_input(input);
    check_movie(&movie)?;

    state.movies.insert(&mut movie).await?;
    tracing::info!(movie_id = movie.id, "movie created");

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)).map_err(|err| {
        tracing::error!(error = %err, movie_id = movie.id, "invalid location header");
        ApiError::Internal
    })?;

    Ok(
        JsonResponse::new(StatusCode::CREATED, Envelope::of("movie", &movie))
            .header(header::LOCATION, location),
    )
}

/// GET /v1/movies/:id
pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JsonResponse> {
    let id = parse_id(&id)?;
    let movie = state.movies.get(id).await?;
    Ok(JsonResponse::ok(Envelope::of("movie", &movie)))
}

/// PATCH /v1/movies/:id
///
/// Read, apply the keys present in the body, re-validate the whole record,
/// then write conditionally on the version that was read.
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> ApiResult<JsonResponse> {
    let id = parse_id(&id)?;
    let mut movie = state.movies.get(id).await?;

    let input: UpdateMovieInput = decode_body(body).await?;
    input.apply_to(&mut movie);
    check_movie(&movie)?;

    let read_version = movie.version;
    state.movies.update(&mut movie).await.map_err(|err| {
        tracing::debug!(movie_id = id, read_version, error = %err, "conditional update failed");
        ApiError::from(err)
    })?;
    tracing::info!(movie_id = id, version = movie.version, "movie updated");

    Ok(JsonResponse::ok(Envelope::of("movie", &movie)))
}

/// DELETE /v1/movies/:id
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JsonResponse> {
    let id = parse_id(&id)?;
    state.movies.delete(id).await?;
    tracing::info!(movie_id = id, "movie deleted");

    Ok(JsonResponse::ok(Envelope::of(
        "message",
        "movie successfully deleted",
    )))
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let body = metrics::gather_metrics(&state.registry);
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

pub async fn route_not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
