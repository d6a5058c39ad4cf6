//! Client-side session context.
//!
//! Holds the signed-in identity and, while impersonating, the real identity
//! behind it. Passed explicitly to whoever needs it; snapshots serialise so
//! the CLI can persist them between runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::UserProfile;
use crate::roles::{resolve, Action, Capabilities, Denial, Plan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("already signed in as another user; restore your own account first")]
    AlreadyImpersonating,
    #[error("{0}")]
    Denied(Denial),
}

/// Serialisable form of a [`SessionContext`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ActiveSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<ActiveSession>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    current: Option<ActiveSession>,
    original: Option<ActiveSession>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        // An original identity without a current one is meaningless.
        let original = snapshot.current.as_ref().and(snapshot.original);
        Self {
            current: snapshot.current,
            original,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.current.clone(),
            original: self.original.clone(),
        }
    }

    pub fn login(&mut self, user: UserProfile, token: String) {
        tracing::info!(user = %user.email, "signed in");
        self.current = Some(ActiveSession { user, token });
        self.original = None;
    }

    pub fn logout(&mut self) {
        self.current = None;
        self.original = None;
    }

    pub fn current(&self) -> Option<&ActiveSession> {
        self.current.as_ref()
    }

    pub fn original_user(&self) -> Option<&UserProfile> {
        self.original.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_impersonating(&self) -> bool {
        self.original.is_some()
    }

    /// Check whether the signed-in user may perform `action` on `target`.
    /// Uses the real identity when impersonating.
    pub fn check(&self, target: &UserProfile, action: Action) -> Result<(), SessionError> {
        let actor = self
            .original
            .as_ref()
            .or(self.current.as_ref())
            .ok_or(SessionError::NotSignedIn)?;
        resolve(actor.user.role, target.role, action)
            .into_result()
            .map_err(SessionError::Denied)
    }

    /// Assume `target`'s identity, keeping a back-reference to ours.
    pub fn impersonate(&mut self, target: UserProfile, token: String) -> Result<(), SessionError> {
        if self.is_impersonating() {
            return Err(SessionError::AlreadyImpersonating);
        }
        self.check(&target, Action::Impersonate)?;
        let previous = self.current.replace(ActiveSession {
            user: target,
            token,
        });
        self.original = previous;
        if let (Some(me), Some(them)) = (self.original_user(), self.current()) {
            tracing::info!(actor = %me.email, target = %them.user.email, "impersonation started");
        }
        Ok(())
    }

    /// Drop the impersonated identity and return to our own.
    pub fn restore_original(&mut self) -> Option<&UserProfile> {
        let original = self.original.take()?;
        self.current = Some(original);
        self.current.as_ref().map(|s| &s.user)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.current
            .as_ref()
            .map(|s| s.user.role.capabilities())
            .unwrap_or_default()
    }

    pub fn effective_plan(&self) -> Option<Plan> {
        self.current.as_ref().map(|s| s.user.effective_plan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{AccountStatus, DenialKind, Role};
    use uuid::Uuid;

    fn user(email: &str, role: Role) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.to_string(),
            avatar: None,
            role,
            plan: Plan::Pro,
            status: AccountStatus::Active,
            created_at: None,
        }
    }

    #[test]
    fn test_impersonate_and_restore() {
        let mut ctx = SessionContext::new();
        ctx.login(user("boss@x.com", Role::Executive), "t1".to_string());
        ctx.impersonate(user("m@x.com", Role::Member), "t2".to_string())
            .unwrap();

        assert!(ctx.is_impersonating());
        assert_eq!(ctx.token(), Some("t2"));
        assert_eq!(ctx.original_user().unwrap().email, "boss@x.com");
        assert_eq!(ctx.effective_plan(), Some(Plan::Pro));

        let restored = ctx.restore_original().unwrap();
        assert_eq!(restored.email, "boss@x.com");
        assert!(!ctx.is_impersonating());
        assert_eq!(ctx.token(), Some("t1"));
        assert_eq!(ctx.effective_plan(), Some(Plan::GodMode));
        assert!(ctx.restore_original().is_none());
    }

    #[test]
    fn test_cannot_impersonate_owner_or_peer() {
        let mut ctx = SessionContext::new();
        ctx.login(user("sa@x.com", Role::SuperAdmin), "t".to_string());

        match ctx.impersonate(user("o@x.com", Role::Owner), "x".to_string()) {
            Err(SessionError::Denied(d)) => assert_eq!(d.kind, DenialKind::TargetIsOwner),
            other => panic!("unexpected: {other:?}"),
        }
        match ctx.impersonate(user("sa2@x.com", Role::SuperAdmin), "x".to_string()) {
            Err(SessionError::Denied(d)) => assert_eq!(d.kind, DenialKind::PeerOrAbove),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!ctx.is_impersonating());
        assert_eq!(ctx.token(), Some("t"));
    }

    #[test]
    fn test_no_nested_impersonation() {
        let mut ctx = SessionContext::new();
        ctx.login(user("o@x.com", Role::Owner), "t".to_string());
        ctx.impersonate(user("e@x.com", Role::Executive), "t2".to_string())
            .unwrap();
        assert_eq!(
            ctx.impersonate(user("m@x.com", Role::Member), "t3".to_string()),
            Err(SessionError::AlreadyImpersonating)
        );
    }

    #[test]
    fn test_requires_login() {
        let mut ctx = SessionContext::new();
        assert_eq!(
            ctx.impersonate(user("m@x.com", Role::Member), "t".to_string()),
            Err(SessionError::NotSignedIn)
        );
        assert_eq!(ctx.capabilities(), Capabilities::default());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut ctx = SessionContext::new();
        ctx.login(user("mgr@x.com", Role::Manager), "t1".to_string());
        ctx.impersonate(user("m@x.com", Role::Member), "t2".to_string())
            .unwrap();

        let json = serde_json::to_string(&ctx.snapshot()).unwrap();
        let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();
        let restored = SessionContext::from_snapshot(snapshot);
        assert!(restored.is_impersonating());
        assert_eq!(restored.token(), Some("t2"));

        ctx.logout();
        assert_eq!(ctx.snapshot(), SessionSnapshot::default());
    }
}
