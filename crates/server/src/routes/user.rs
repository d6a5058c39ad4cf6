use axum::{extract::State, Json};
use shared::{ProfileUpdate, UserProfile};

use crate::{
    error::{ApiJson, AppError},
    routes::auth::AuthUser,
    state::AppState,
};

/// GET /api/user/profile
pub async fn get_profile(auth: AuthUser) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(auth.user.profile()?))
}

/// PUT /api/user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Name cannot be empty".to_string()));
    }

    if !state.db.update_profile(&auth.user.id, &update).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    let user = state
        .db
        .get_user_by_id(&auth.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!("Profile updated for {}", user.email);
    Ok(Json(user.profile()?))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{json_request, read_json, register, test_app};
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_profile_with_valid_token() {
        let (app, _) = test_app().await;
        let session = register(&app, "a@b.com", "A").await;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::GET,
                "/api/user/profile",
                Some(&session.token),
                &serde_json::Value::Null,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["email"], "a@b.com");
        assert!(body.get("password_hash").is_none());
        assert!(body.get("password").is_none());

        let response = app
            .oneshot(json_request(
                Method::PUT,
                "/api/user/profile",
                Some(&session.token),
                &serde_json::json!({"name": "Alice", "avatar": "https://img/a.png"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["name"], "Alice");
        assert_eq!(body["avatar"], "https://img/a.png");
    }

    #[tokio::test]
    async fn test_profile_rejects_bad_tokens() {
        let (app, state) = test_app().await;
        let session = register(&app, "a@b.com", "A").await;

        let expired = {
            use jsonwebtoken::{encode, EncodingKey, Header};
            let claims = crate::routes::auth::Claims {
                sub: session.user.id.to_string(),
                exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as usize,
                imp: None,
            };
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(state.config.auth.jwt_secret.as_bytes()),
            )
            .unwrap()
        };

        for method in [Method::GET, Method::PUT] {
            for token in [None, Some("not-a-jwt"), Some(expired.as_str())] {
                let response = app
                    .clone()
                    .oneshot(json_request(
                        method.clone(),
                        "/api/user/profile",
                        token,
                        &serde_json::json!({"name": "X"}),
                    ))
                    .await
                    .unwrap();
                assert_eq!(
                    response.status(),
                    StatusCode::UNAUTHORIZED,
                    "{} with {:?}",
                    method,
                    token
                );
            }
        }
    }
}
