#![allow(dead_code)]

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod practice;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::EngineError;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1/drills", drill_routes())
        .nest("/api/v1/assignments", assignment_routes())
        .nest("/api/v1/reviews", review_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn drill_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::drills::create_drill))
        .route("/{id}/assign", post(handlers::drills::assign_drill))
}

fn assignment_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/{id}/complete", post(handlers::drills::complete_assignment))
        .route(
            "/{id}/attempts/latest",
            get(handlers::drills::latest_attempt),
        )
        .route(
            "/{id}/status",
            patch(handlers::drills::update_assignment_status),
        )
}

fn review_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", get(handlers::reviews::list_review_queue))
        .route(
            "/sentence/{attempt_id}",
            post(handlers::reviews::review_sentence),
        )
        .route(
            "/grammar/{attempt_id}",
            post(handlers::reviews::review_grammar),
        )
        .route(
            "/summary/{attempt_id}",
            post(handlers::reviews::review_summary),
        )
}
