// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{health, progress},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Mounts the progress routes under `/api/users/{user_id}/progress`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (the tracker).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let progress_routes = Router::new()
        .route("/calculate", post(progress::calculate_topic_mastery))
        .route("/subject/{subject_id}", get(progress::get_subject_progress))
        .route(
            "/subject/{subject_id}/summary",
            get(progress::get_subject_summary),
        )
        .route(
            "/topic/{subject_id}/{topic}",
            get(progress::get_topic_progress),
        );

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/users/{user_id}/progress", progress_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
