//! Helpers for driving the router in tests.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde::de::DeserializeOwned;
use shared::{AccountStatus, AuthResponse, Plan, Role};
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{Database, User},
    routes::{self, auth::generate_token},
    state::AppState,
};

pub const OWNER_EMAIL: &str = "owner@prophone.test";

pub async fn test_app() -> (Router, AppState) {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();

    let mut config = Config::default();
    config.auth.owner_email = Some(OWNER_EMAIL.to_string());
    config.auth.jwt_secret = "test-secret".to_string();

    let state = AppState::new(db, config);
    (routes::create_router(state.clone()), state)
}

/// JSON request; a `Null` body sends no body at all.
pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if body.is_null() {
        return builder.body(Body::empty()).unwrap();
    }
    builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register through the public route.
pub async fn register(app: &Router, email: &str, name: &str) -> AuthResponse {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            &serde_json::json!({"email": email, "password": "password", "name": name}),
        ))
        .await
        .unwrap();
    read_json(response).await
}

/// Insert an account with an arbitrary role and mint a token for it.
pub async fn seed_user(state: &AppState, email: &str, role: Role) -> AuthResponse {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: "unused".to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        avatar: None,
        role: role.as_str().to_string(),
        plan: role.effective_plan(Plan::Starter).as_str().to_string(),
        status: AccountStatus::Active.as_str().to_string(),
        created_at: None,
    };
    state.db.create_user(&user).await.unwrap();
    let token = generate_token(&user.id, None, &state.config.auth).unwrap();
    AuthResponse {
        user: user.profile().unwrap(),
        token,
    }
}
