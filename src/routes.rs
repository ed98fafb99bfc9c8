// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, player, session},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public player routes (quiz definition, session transitions).
/// * Admin routes behind JWT auth plus the admin role check.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let allow_origin = if state.config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/{slug}", get(player::get_quiz))
        .route(
            "/{slug}/sessions/{session_id}",
            post(player::start_session).get(player::get_session),
        )
        .route("/{slug}/sessions/{session_id}/answer", post(player::answer))
        .route("/{slug}/sessions/{session_id}/advance", post(player::advance))
        .route("/{slug}/sessions/{session_id}/back", post(player::back));

    let admin_routes = Router::new()
        .route(
            "/quizzes",
            get(admin::list_quizzes).put(admin::publish_quiz),
        )
        .route("/quizzes/{slug}/analytics", get(admin::get_analytics))
        .route("/quizzes/{slug}/responses", get(admin::list_responses))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(session::health))
        .route("/api/sessions", post(session::create_session))
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
