use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    AccountStatus, AuthResponse, LoginRequest, MagicCodeRequest, MagicCodeResponse,
    MagicCodeStatus, MagicCodeVerifyRequest, Plan, RegisterRequest, Role,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    db::{Conflict, User},
    error::{ApiJson, AppError},
    mailer,
    state::{AppState, MagicCodeState},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    /// Impersonator's user_id on "login as" tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imp: Option<String>,
}

/// The caller behind a Bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub impersonator: Option<User>,
}

impl AuthUser {
    /// Role that authorizes admin actions. While impersonating this is the
    /// impersonator's role, matching what the client checks locally.
    pub fn acting_role(&self) -> Result<Role, AppError> {
        Ok(self.impersonator.as_ref().unwrap_or(&self.user).role()?)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::AuthError("Missing or malformed authorization header".to_string())
                })?;
        authenticate(state, bearer.token()).await
    }
}

/// Resolve a token to live, sign-in-capable accounts.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, &state.config.auth.jwt_secret)?;
    let user = load_signed_in(state, &claims.sub).await?;
    let impersonator = match claims.imp.as_deref() {
        Some(id) => Some(load_signed_in(state, id).await?),
        None => None,
    };
    Ok(AuthUser { user, impersonator })
}

async fn load_signed_in(state: &AppState, user_id: &str) -> Result<User, AppError> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;
    ensure_can_sign_in(&user)?;
    Ok(user)
}

pub(crate) fn ensure_can_sign_in(user: &User) -> Result<(), AppError> {
    let status = user.status()?;
    if status.can_sign_in() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Account is {}", status)))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email);
    let name = req.name.trim();
    if email.is_empty() || !email.contains('@') || req.password.is_empty() || name.is_empty() {
        return Err(AppError::BadRequest(
            "Email, password and name are required".to_string(),
        ));
    }

    // Check if user already exists
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let is_owner = state
        .config
        .auth
        .owner_email
        .as_deref()
        .map(normalize_email)
        .is_some_and(|owner| owner == email);
    let is_owner = if is_owner && state.db.owner_exists().await? {
        tracing::warn!("Owner already exists, registering {} as a regular user", email);
        false
    } else {
        is_owner
    };
    let (role, plan) = if is_owner {
        (Role::Owner, Plan::GodMode)
    } else {
        (Role::User, Plan::Starter)
    };

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(&req.password)?,
        name: name.to_string(),
        avatar: None,
        role: role.as_str().to_string(),
        plan: plan.as_str().to_string(),
        status: AccountStatus::Active.as_str().to_string(),
        created_at: None,
    };
    if let Err(e) = state.db.create_user(&user).await {
        return Err(match e.downcast_ref::<Conflict>() {
            Some(Conflict::Email) => AppError::BadRequest("Email already registered".to_string()),
            Some(Conflict::Owner) => {
                AppError::BadRequest("An owner account already exists".to_string())
            }
            None => e.into(),
        });
    }
    tracing::info!("Registered {} as {}", user.email, role);

    let token = generate_token(&user.id, None, &state.config.auth)?;
    // Re-read so created_at comes back from the store
    let stored = state.db.get_user_by_id(&user.id).await?.unwrap_or(user);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: stored.profile()?,
            token,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .db
        .get_user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    verify_password(&req.password, &user.password_hash)?;
    ensure_can_sign_in(&user)?;

    let token = generate_token(&user.id, None, &state.config.auth)?;
    tracing::info!("User {} logged in", user.email);

    Ok(Json(AuthResponse {
        user: user.profile()?,
        token,
    }))
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<(), AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::AuthError("Invalid email or password".to_string()))
}

pub fn generate_token(
    user_id: &str,
    impersonator: Option<&str>,
    auth_config: &AuthConfig,
) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
        imp: impersonator.map(str::to_string),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthError("Invalid or expired token".to_string())
    })
}

// ============================================================================
// Magic-code sign-in
// ============================================================================

/// Wrong guesses allowed before a pending code is revoked
const MAX_MAGIC_CODE_ATTEMPTS: u32 = 5;

fn generate_magic_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Email a one-time sign-in code
/// POST /api/auth/magic-code
pub async fn request_magic_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MagicCodeRequest>,
) -> Result<(StatusCode, Json<MagicCodeResponse>), AppError> {
    let email = normalize_email(&req.email);
    let reply = |code: StatusCode, status: MagicCodeStatus| -> Result<_, AppError> {
        Ok((code, Json(MagicCodeResponse { status })))
    };

    if state.db.get_user_by_email(&email).await?.is_none() {
        tracing::info!("Magic code requested for unknown email: {}", email);
        return reply(StatusCode::NOT_FOUND, MagicCodeStatus::NotRegistered);
    }

    let code = generate_magic_code();
    let ttl = state.config.auth.magic_code_ttl_minutes;
    state.magic_codes.insert(
        email.clone(),
        MagicCodeState {
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(ttl),
            attempts: 0,
        },
    );

    if !state.config.smtp.enabled {
        tracing::warn!("SMTP not configured, magic code: {} for {}", code, email);
        return reply(StatusCode::OK, MagicCodeStatus::Sent);
    }

    match mailer::send_magic_code(&state.config.smtp, &email, &code, ttl).await {
        Ok(()) => {
            tracing::info!("Magic code sent to {}", email);
            reply(StatusCode::OK, MagicCodeStatus::Sent)
        }
        Err(e) => {
            tracing::error!("Failed to send magic code to {}: {}", email, e);
            state.magic_codes.remove(&email);
            reply(StatusCode::BAD_GATEWAY, MagicCodeStatus::DeliveryFailed)
        }
    }
}

/// Exchange a magic code for a session
/// POST /api/auth/magic-code/verify
pub async fn verify_magic_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MagicCodeVerifyRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&req.email);
    let invalid = || AppError::AuthError("Invalid or expired code".to_string());

    // Clean up expired codes first
    state.magic_codes.retain(|_, v| v.expires_at > Utc::now());

    let mut pending = state.magic_codes.get_mut(&email).ok_or_else(invalid)?;
    if pending.code != req.code.trim() {
        pending.attempts += 1;
        let exhausted = pending.attempts >= MAX_MAGIC_CODE_ATTEMPTS;
        drop(pending); // Release the lock before removing
        if exhausted {
            tracing::warn!("Too many wrong magic codes for {}, code revoked", email);
            state.magic_codes.remove(&email);
        }
        return Err(invalid());
    }
    drop(pending);
    state.magic_codes.remove(&email);

    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    ensure_can_sign_in(&user)?;

    let token = generate_token(&user.id, None, &state.config.auth)?;
    tracing::info!("User {} signed in with magic code", user.email);

    Ok(Json(AuthResponse {
        user: user.profile()?,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_request, read_json, seed_user, test_app, OWNER_EMAIL};
    use axum::http::Method;
    use tower::ServiceExt;

    #[test]
    fn test_token_roundtrip_and_expiry() {
        let config = crate::config::Config::default().auth;
        let token = generate_token("u1", Some("admin"), &config).unwrap();
        let claims = verify_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.imp.as_deref(), Some("admin"));

        assert!(verify_token(&token, "other-secret").is_err());

        let expired = encode(
            &Header::default(),
            &Claims {
                sub: "u1".to_string(),
                exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
                imp: None,
            },
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_token(&expired, &config.jwt_secret),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_magic_code_shape() {
        for _ in 0..50 {
            let code = generate_magic_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let (app, _) = test_app().await;
        let body = serde_json::json!({"email": "a@b.com", "password": "pw", "name": "A"});

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/auth/register", None, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: serde_json::Value = read_json(response).await;
        assert_eq!(created["user"]["email"], "a@b.com");
        assert_eq!(created["user"]["role"], "user");
        assert!(created["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(created["user"].get("password_hash").is_none());

        let response = app
            .oneshot(json_request(Method::POST, "/api/auth/register", None, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: serde_json::Value = read_json(response).await;
        assert_eq!(error["error"], "Email already registered");
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                &serde_json::json!({"email": "a@b.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_owner_email_registers_owner() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                &serde_json::json!({"email": "Owner@ProPhone.test", "password": "pw", "name": "O"}),
            ))
            .await
            .unwrap();
        let created: serde_json::Value = read_json(response).await;
        assert_eq!(created["user"]["role"], "owner");
        assert_eq!(created["user"]["plan"], "god_mode");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password_and_suspended() {
        let (app, state) = test_app().await;
        let body = serde_json::json!({"email": "a@b.com", "password": "pw", "name": "A"});
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/auth/register", None, &body))
            .await
            .unwrap();
        let created: serde_json::Value = read_json(response).await;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                &serde_json::json!({"email": "a@b.com", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let id = created["user"]["id"].as_str().unwrap();
        state
            .db
            .update_status(id, AccountStatus::Suspended)
            .await
            .unwrap();
        let response = app
            .oneshot(json_request(Method::POST, "/api/auth/login", None, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_magic_code_flow() {
        let (app, state) = test_app().await;
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code",
                None,
                &serde_json::json!({"email": "nobody@b.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = read_json(response).await;
        assert_eq!(body["status"], "not_registered");

        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                &serde_json::json!({"email": "a@b.com", "password": "pw", "name": "A"}),
            ))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code",
                None,
                &serde_json::json!({"email": "a@b.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let code = state.magic_codes.get("a@b.com").unwrap().code.clone();
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code/verify",
                None,
                &serde_json::json!({"email": "a@b.com", "code": "not-it"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code/verify",
                None,
                &serde_json::json!({"email": "a@b.com", "code": code}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Codes are single-use
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code/verify",
                None,
                &serde_json::json!({"email": "a@b.com", "code": code}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    async fn verify_code(app: &axum::Router, code: &str) -> StatusCode {
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code/verify",
                None,
                &serde_json::json!({"email": "a@b.com", "code": code}),
            ))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_magic_code_revoked_after_wrong_guesses() {
        let (app, state) = test_app().await;
        seed_user(&state, "a@b.com", Role::User).await;
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/magic-code",
                None,
                &serde_json::json!({"email": "a@b.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let code = state.magic_codes.get("a@b.com").unwrap().code.clone();

        let wrong = if code == "000000" { "000001" } else { "000000" };
        for _ in 0..MAX_MAGIC_CODE_ATTEMPTS {
            assert_eq!(verify_code(&app, wrong).await, StatusCode::UNAUTHORIZED);
        }
        assert!(state.magic_codes.get("a@b.com").is_none());
        assert_eq!(verify_code(&app, &code).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_owner_email_after_owner_exists_registers_user() {
        let (app, state) = test_app().await;
        seed_user(&state, "boss@b.com", Role::Owner).await;

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                &serde_json::json!({"email": OWNER_EMAIL, "password": "pw", "name": "O"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: serde_json::Value = read_json(response).await;
        assert_eq!(created["user"]["role"], "user");
        assert_eq!(created["user"]["plan"], "starter");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_bad_request() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                &serde_json::json!({"email": 5, "password": "pw", "name": "A"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: shared::ErrorBody = read_json(response).await;
        assert!(!error.error.is_empty());
        assert!(error.reason.is_none());
    }
}
