// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{comments, moderation},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public read routes (threads, replies, subtree queries).
/// * Authenticated write routes (create, delete, like).
/// * Admin routes (moderation decisions, counter repair).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let public_routes = Router::new()
        .route(
            "/targets/{target_type}/{target_id}/comments",
            get(comments::list_thread),
        )
        .route("/comments/{id}", get(comments::get_comment))
        .route("/comments/{id}/replies", get(comments::list_replies))
        .route("/comments/{id}/ancestors", get(comments::get_ancestors))
        .route("/comments/{id}/descendants", get(comments::get_descendants));

    let member_routes = Router::new()
        .route("/comments", post(comments::create_comment))
        .route(
            "/comments/{id}",
            axum::routing::delete(comments::delete_comment),
        )
        .route(
            "/comments/{id}/like",
            post(comments::toggle_like).delete(comments::unlike),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/comments/{id}/moderation",
            post(moderation::apply_decision),
        )
        .route("/comments/{id}/resync", post(moderation::resync_counters))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", public_routes.merge(member_routes))
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
