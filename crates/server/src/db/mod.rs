use anyhow::Result;
use shared::{AccountStatus, MemberUpdate, ProfileUpdate};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use thiserror::Error;

mod models;

pub use models::*;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, avatar, role, plan, status, created_at";

/// Insert refused by a uniqueness rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("email already registered")]
    Email,
    #[error("an owner account already exists")]
    Owner,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database that lives as long as the pool.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                avatar TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                plan TEXT NOT NULL DEFAULT 'starter',
                status TEXT NOT NULL DEFAULT 'active',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one owner per platform
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_single_owner ON users(role) WHERE role = 'owner'",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, avatar, role, plan, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.role)
        .bind(&user.plan)
        .bind(&user.status)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                if db_err.message().contains("users.email") {
                    Conflict::Email.into()
                } else {
                    Conflict::Owner.into()
                }
            }
            _ => anyhow::Error::from(e),
        })?;
        Ok(())
    }

    pub async fn owner_exists(&self) -> Result<bool> {
        let owners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'owner'")
            .fetch_one(&self.pool)
            .await?;
        Ok(owners > 0)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, email ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET name = COALESCE(?, name), avatar = COALESCE(?, avatar) WHERE id = ?",
        )
        .bind(&update.name)
        .bind(&update.avatar)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_member(&self, id: &str, update: &MemberUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                avatar = COALESCE(?, avatar),
                role = COALESCE(?, role),
                plan = COALESCE(?, plan)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.avatar)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.plan.map(|p| p.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_status(&self, id: &str, status: AccountStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Plan, Role};

    fn user(id: &str, email: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: "Test".to_string(),
            avatar: None,
            role: role.as_str().to_string(),
            plan: Plan::Starter.as_str().to_string(),
            status: AccountStatus::Active.as_str().to_string(),
            created_at: None,
        }
    }

    async fn db() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_single_owner_enforced() {
        let db = db().await;
        assert!(!db.owner_exists().await.unwrap());
        db.create_user(&user("1", "o@x.com", Role::Owner)).await.unwrap();
        assert!(db.owner_exists().await.unwrap());

        let err = db.create_user(&user("2", "o2@x.com", Role::Owner)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<Conflict>(), Some(&Conflict::Owner));
        db.create_user(&user("3", "a@x.com", Role::SuperAdmin)).await.unwrap();
        db.create_user(&user("4", "b@x.com", Role::SuperAdmin)).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let db = db().await;
        db.create_user(&user("1", "a@x.com", Role::User)).await.unwrap();
        let err = db.create_user(&user("2", "a@x.com", Role::User)).await.unwrap_err();
        assert_eq!(err.downcast_ref::<Conflict>(), Some(&Conflict::Email));
    }

    #[tokio::test]
    async fn test_member_update_and_status() {
        let db = db().await;
        db.create_user(&user("1", "m@x.com", Role::Member)).await.unwrap();

        let update = MemberUpdate {
            role: Some(Role::Manager),
            plan: Some(Plan::Team),
            ..Default::default()
        };
        assert!(db.update_member("1", &update).await.unwrap());
        assert!(db.update_status("1", AccountStatus::Suspended).await.unwrap());

        let stored = db.get_user_by_id("1").await.unwrap().unwrap();
        assert_eq!(stored.role, "manager");
        assert_eq!(stored.plan, "team");
        assert_eq!(stored.name, "Test");
        assert_eq!(stored.status().unwrap(), AccountStatus::Suspended);

        assert!(db.delete_user("1").await.unwrap());
        assert!(!db.delete_user("1").await.unwrap());
        assert!(db.get_user_by_email("m@x.com").await.unwrap().is_none());
    }
}
