use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod copilot;
mod health;
mod relay;
mod team;
mod user;

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            tracing::warn!("Invalid CORS origin, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.server.cors_origin.as_deref());

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        // Magic-code sign-in
        .route("/api/auth/magic-code", post(auth::request_magic_code))
        .route("/api/auth/magic-code/verify", post(auth::verify_magic_code))
        // Profile
        .route(
            "/api/user/profile",
            get(user::get_profile).put(user::update_profile),
        )
        // Team administration
        .route("/api/team/members", get(team::list_members))
        .route(
            "/api/team/members/:id",
            put(team::update_member).delete(team::delete_member),
        )
        .route("/api/team/members/:id/suspend", post(team::suspend_member))
        .route("/api/team/members/:id/ban", post(team::ban_member))
        .route(
            "/api/team/members/:id/reactivate",
            post(team::reactivate_member),
        )
        .route(
            "/api/team/members/:id/impersonate",
            post(team::impersonate_member),
        )
        // Copilot proxy
        .route("/api/copilot/chat", post(copilot::chat))
        // Relay socket
        .route("/ws/relay", get(relay::ws_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
