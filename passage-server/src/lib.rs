//! # passage-server
//!
//! HTTP surface of the passage retrieval backend: a thin axum layer
//! dispatching to the engine's services. API-key authentication is an edge
//! concern and not handled here.

pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the full API router.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::utility::index))
        .route("/health", get(handlers::utility::health))
        .route("/collection", post(handlers::collection::create))
        .route("/collection/{id}", get(handlers::collection::fetch))
        .route("/collection/{id}", put(handlers::collection::update))
        .route(
            "/collection/{id}/resources",
            get(handlers::collection::resources),
        )
        .route("/resource", post(handlers::resource::create))
        .route("/resource/{id}", get(handlers::resource::fetch))
        .route("/resource/{id}", put(handlers::resource::update))
        .route("/resource/{id}", delete(handlers::resource::remove))
        .route("/resource/{id}/chunks", get(handlers::resource::chunks))
        .route("/search", post(handlers::search::search))
        .route("/feedback/vote", post(handlers::feedback::vote))
        .route(
            "/feedback/vote/{reference_id}/{action}",
            get(handlers::feedback::vote_by_reference),
        )
        .route(
            "/utility/encoding-models",
            get(handlers::utility::encoding_models),
        )
        .route("/eval/cases", post(handlers::eval::create_case))
        .route(
            "/eval/cases/{collection_id}/{owner_id}",
            get(handlers::eval::list_cases),
        )
        .route(
            "/eval/run/{dataset_id}/{owner_id}",
            post(handlers::eval::run),
        )
        .with_state(state)
        .layer(cors)
}
