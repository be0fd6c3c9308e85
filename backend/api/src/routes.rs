use axum::{
    routing::{get, MethodRouter},
    Router,
};

use crate::{handlers, state::AppState};

/// Unsupported verbs on a known path answer 405 with the JSON error envelope
fn with_405(router: MethodRouter<AppState>) -> MethodRouter<AppState> {
    router.fallback(handlers::method_not_allowed)
}

pub fn observability_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(handlers::metrics_endpoint))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/v1/healthcheck", with_405(get(handlers::health_check)))
}

pub fn movie_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/movies",
            with_405(get(handlers::list_movies).post(handlers::create_movie)),
        )
        .route(
            "/v1/movies/:id",
            with_405(
                get(handlers::show_movie)
                    .patch(handlers::update_movie)
                    .delete(handlers::delete_movie),
            ),
        )
}

/// Every route of the service, with the JSON 404 fallback; layers are added by the caller
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(movie_routes())
        .merge(observability_routes())
        .fallback(handlers::route_not_found)
}
