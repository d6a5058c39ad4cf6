use anyhow::{Context, Result};
use shared::{AccountStatus, Plan, Role, UserProfile};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub avatar: Option<String>,
    pub role: String,
    pub plan: String,
    pub status: String,
    pub created_at: Option<String>,
}

impl User {
    pub fn role(&self) -> Result<Role> {
        self.role
            .parse()
            .with_context(|| format!("user {} has invalid role", self.id))
    }

    pub fn status(&self) -> Result<AccountStatus> {
        self.status
            .parse()
            .with_context(|| format!("user {} has invalid status", self.id))
    }

    /// Client-facing view; the password hash never leaves this struct.
    pub fn profile(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: Uuid::parse_str(&self.id).with_context(|| format!("invalid user id {}", self.id))?,
            email: self.email.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            role: self.role()?,
            plan: self
                .plan
                .parse::<Plan>()
                .with_context(|| format!("user {} has invalid plan", self.id))?,
            status: self.status()?,
            created_at: self.created_at.clone(),
        })
    }
}
