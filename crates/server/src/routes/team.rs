//! Team administration. Every mutation goes through the role resolver with
//! the caller's acting role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{resolve, Action, ImpersonationResponse, MemberUpdate, Role, UserProfile};

use crate::{
    db::User,
    error::{ApiJson, AppError},
    routes::auth::{ensure_can_sign_in, generate_token, AuthUser},
    state::AppState,
};

async fn load_target(state: &AppState, id: &str) -> Result<User, AppError> {
    state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Team member not found".to_string()))
}

fn authorize(auth: &AuthUser, target: &User, action: Action) -> Result<(), AppError> {
    let actor = auth.acting_role()?;
    resolve(actor, target.role()?, action)
        .into_result()
        .map_err(|denial| {
            tracing::info!(
                actor = %auth.user.email,
                target = %target.email,
                "Denied: {}",
                denial
            );
            AppError::Denied(denial)
        })
}

/// GET /api/team/members
pub async fn list_members(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let members = state
        .db
        .list_users()
        .await?
        .iter()
        .map(User::profile)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(members))
}

/// PUT /api/team/members/:id
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<MemberUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let target = load_target(&state, &id).await?;
    authorize(&auth, &target, Action::Edit)?;

    if let Some(role) = update.role {
        if role == Role::Owner {
            return Err(AppError::Forbidden(
                "The owner role cannot be assigned".to_string(),
            ));
        }
        // Nobody can promote an account to their own level or above
        resolve(auth.acting_role()?, role, Action::Edit)
            .into_result()
            .map_err(AppError::Denied)?;
    }
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Name cannot be empty".to_string()));
    }

    state.db.update_member(&id, &update).await?;
    let updated = load_target(&state, &id).await?;
    tracing::info!("{} edited {}", auth.user.email, updated.email);
    Ok(Json(updated.profile()?))
}

/// DELETE /api/team/members/:id
pub async fn delete_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = load_target(&state, &id).await?;
    authorize(&auth, &target, Action::Delete)?;

    if !state.db.delete_user(&id).await? {
        return Err(AppError::NotFound("Team member not found".to_string()));
    }
    tracing::info!("{} deleted {}", auth.user.email, target.email);
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    state: AppState,
    auth: AuthUser,
    id: String,
    action: Action,
) -> Result<Json<UserProfile>, AppError> {
    let target = load_target(&state, &id).await?;
    authorize(&auth, &target, action)?;

    let status = action
        .resulting_status()
        .ok_or_else(|| AppError::Internal(format!("{} does not change status", action)))?;
    state.db.update_status(&id, status).await?;

    let updated = load_target(&state, &id).await?;
    tracing::info!("{} set {} to {}", auth.user.email, updated.email, status);
    Ok(Json(updated.profile()?))
}

/// POST /api/team/members/:id/suspend
pub async fn suspend_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    change_status(state, auth, id, Action::Suspend).await
}

/// POST /api/team/members/:id/ban
pub async fn ban_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    change_status(state, auth, id, Action::Ban).await
}

/// POST /api/team/members/:id/reactivate
pub async fn reactivate_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    change_status(state, auth, id, Action::Reactivate).await
}

/// "Login as" another account
/// POST /api/team/members/:id/impersonate
pub async fn impersonate_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ImpersonationResponse>, AppError> {
    if auth.impersonator.is_some() {
        return Err(AppError::Forbidden(
            "Already signed in as another user; restore your own account first".to_string(),
        ));
    }
    let target = load_target(&state, &id).await?;
    authorize(&auth, &target, Action::Impersonate)?;
    ensure_can_sign_in(&target)?;

    let token = generate_token(&target.id, Some(&auth.user.id), &state.config.auth)?;
    tracing::info!("{} is now signed in as {}", auth.user.email, target.email);

    Ok(Json(ImpersonationResponse {
        user: target.profile()?,
        token,
        original_user: auth.user.profile()?,
    }))
}
