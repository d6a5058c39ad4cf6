//! Role hierarchy and the capability resolver.
//!
//! Every administrative gate (team routes on the server, impersonation in the
//! session context, the CLI) goes through [`resolve`] so the rules live in one
//! place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Roles, plans, statuses
// ============================================================================

/// Platform role, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    SuperAdmin,
    Executive,
    Manager,
    Member,
    User,
    SubUser,
}

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Starter,
    Pro,
    Enterprise,
    GodMode,
    Team,
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Inactive,
    Banned,
}

/// Administrative action one account performs on another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Edit,
    Delete,
    Suspend,
    Ban,
    Reactivate,
    Impersonate,
}

/// What a role unlocks in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub admin_panel: bool,
    pub manage_team: bool,
    pub impersonate: bool,
    pub god_mode: bool,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Owner,
        Role::SuperAdmin,
        Role::Executive,
        Role::Manager,
        Role::Member,
        Role::User,
        Role::SubUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::SuperAdmin => "super_admin",
            Role::Executive => "executive",
            Role::Manager => "manager",
            Role::Member => "member",
            Role::User => "user",
            Role::SubUser => "sub_user",
        }
    }

    /// Higher rank means more privilege.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 6,
            Role::SuperAdmin => 5,
            Role::Executive => 4,
            Role::Manager => 3,
            Role::Member => 2,
            Role::User => 1,
            Role::SubUser => 0,
        }
    }

    /// Owner, super admin and executive run the platform.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Owner | Role::SuperAdmin | Role::Executive)
    }

    pub fn capabilities(&self) -> Capabilities {
        let admin = self.is_admin();
        let manages = admin || *self == Role::Manager;
        Capabilities {
            admin_panel: admin,
            manage_team: manages,
            impersonate: manages,
            god_mode: admin,
        }
    }

    /// Admin roles are always granted God Mode regardless of the stored plan.
    pub fn effective_plan(&self, plan: Plan) -> Plan {
        if self.is_admin() {
            Plan::GodMode
        } else {
            plan
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::SuperAdmin => "super admin",
            Role::Executive => "executive",
            Role::Manager => "manager",
            Role::Member => "member",
            Role::User => "user",
            Role::SubUser => "sub-user",
        }
    }
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
            Plan::GodMode => "god_mode",
            Plan::Team => "team",
        }
    }
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Banned => "banned",
        }
    }

    /// Suspended and banned accounts cannot sign in.
    pub fn can_sign_in(&self) -> bool {
        matches!(self, AccountStatus::Active | AccountStatus::Inactive)
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Suspend => "suspend",
            Action::Ban => "ban",
            Action::Reactivate => "reactivate",
            Action::Impersonate => "impersonate",
        }
    }

    /// Status a target ends up in after this action, if it changes status.
    pub fn resulting_status(&self) -> Option<AccountStatus> {
        match self {
            Action::Suspend => Some(AccountStatus::Suspended),
            Action::Ban => Some(AccountStatus::Banned),
            Action::Reactivate => Some(AccountStatus::Active),
            Action::Edit | Action::Delete | Action::Impersonate => None,
        }
    }

    fn past_participle(&self) -> &'static str {
        match self {
            Action::Edit => "edited",
            Action::Delete => "deleted",
            Action::Suspend => "suspended",
            Action::Ban => "banned",
            Action::Reactivate => "reactivated",
            Action::Impersonate => "impersonated",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! impl_str_enum {
    ($ty:ty, $kind:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| ParseEnumError { kind: $kind, value: s.to_string() })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_str_enum!(Role, "role", [
    Role::Owner, Role::SuperAdmin, Role::Executive, Role::Manager,
    Role::Member, Role::User, Role::SubUser,
]);
impl_str_enum!(Plan, "plan", [Plan::Starter, Plan::Pro, Plan::Enterprise, Plan::GodMode, Plan::Team]);
impl_str_enum!(AccountStatus, "status", [
    AccountStatus::Active, AccountStatus::Suspended, AccountStatus::Inactive, AccountStatus::Banned,
]);
impl_str_enum!(Action, "action", [
    Action::Edit, Action::Delete, Action::Suspend, Action::Ban, Action::Reactivate, Action::Impersonate,
]);

// ============================================================================
// Resolver
// ============================================================================

/// Why an action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// The owner account is never a valid target.
    TargetIsOwner,
    /// Target holds the same or a higher role than the actor.
    PeerOrAbove,
    /// Actor's role cannot administer this kind of account at all.
    InsufficientRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub kind: DenialKind,
    pub actor: Role,
    pub target: Role,
    pub action: Action,
}

impl Denial {
    /// User-facing rejection message.
    pub fn reason(&self) -> String {
        match self.kind {
            DenialKind::TargetIsOwner => {
                format!("owner account cannot be {}", self.action.past_participle())
            }
            DenialKind::PeerOrAbove => format!(
                "insufficient privilege: a {} cannot {} a {} account",
                self.actor.label(),
                self.action.as_str(),
                self.target.label()
            ),
            DenialKind::InsufficientRole => match self.actor {
                Role::Manager => format!(
                    "insufficient role: managers can only {} team members",
                    self.action.as_str()
                ),
                _ => format!(
                    "insufficient role: a {} cannot {} other accounts",
                    self.actor.label(),
                    self.action.as_str()
                ),
            },
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(denial) => Some(denial.reason()),
        }
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(denial) => Err(denial),
        }
    }
}

/// Wire shape `{allowed, reason}` used by UI gates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionView {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Decision> for DecisionView {
    fn from(decision: &Decision) -> Self {
        Self {
            allowed: decision.is_allowed(),
            reason: decision.reason(),
        }
    }
}

/// Decide whether `actor` may perform `action` on an account holding `target`.
pub fn resolve(actor: Role, target: Role, action: Action) -> Decision {
    let deny = |kind| {
        Decision::Denied(Denial {
            kind,
            actor,
            target,
            action,
        })
    };

    if target == Role::Owner {
        return deny(DenialKind::TargetIsOwner);
    }

    match actor {
        Role::Owner => Decision::Allowed,
        Role::SuperAdmin | Role::Executive => {
            if target.rank() >= actor.rank() {
                deny(DenialKind::PeerOrAbove)
            } else {
                Decision::Allowed
            }
        }
        Role::Manager => match target {
            Role::Member => Decision::Allowed,
            t if t.rank() >= actor.rank() => deny(DenialKind::PeerOrAbove),
            _ => deny(DenialKind::InsufficientRole),
        },
        Role::Member | Role::User | Role::SubUser => deny(DenialKind::InsufficientRole),
    }
}

pub fn can_act(actor: Role, target: Role, action: Action) -> bool {
    resolve(actor, target, action).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [Action; 6] = [
        Action::Edit,
        Action::Delete,
        Action::Suspend,
        Action::Ban,
        Action::Reactivate,
        Action::Impersonate,
    ];

    fn expected(actor: Role, target: Role) -> bool {
        use Role::*;
        match (actor, target) {
            (_, Owner) => false,
            (Owner, _) => true,
            (SuperAdmin, Executive | Manager | Member | User | SubUser) => true,
            (Executive, Manager | Member | User | SubUser) => true,
            (Manager, Member) => true,
            _ => false,
        }
    }

    #[test]
    fn test_full_permission_table() {
        for actor in Role::ALL {
            for target in Role::ALL {
                for action in ACTIONS {
                    assert_eq!(
                        can_act(actor, target, action),
                        expected(actor, target),
                        "{actor} -> {target} ({action})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_owner_cannot_suspend_itself() {
        let decision = resolve(Role::Owner, Role::Owner, Action::Suspend);
        assert_eq!(
            decision.reason().as_deref(),
            Some("owner account cannot be suspended")
        );
    }

    #[test]
    fn test_super_admin_cannot_edit_peer() {
        match resolve(Role::SuperAdmin, Role::SuperAdmin, Action::Edit) {
            Decision::Denied(denial) => {
                assert_eq!(denial.kind, DenialKind::PeerOrAbove);
                assert!(denial.reason().contains("insufficient privilege"));
            }
            Decision::Allowed => panic!("super admin edited a peer"),
        }
    }

    #[test]
    fn test_denial_kinds_are_specific() {
        let kind = |a, t| match resolve(a, t, Action::Ban) {
            Decision::Denied(d) => Some(d.kind),
            Decision::Allowed => None,
        };
        assert_eq!(kind(Role::Executive, Role::Owner), Some(DenialKind::TargetIsOwner));
        assert_eq!(kind(Role::Executive, Role::SuperAdmin), Some(DenialKind::PeerOrAbove));
        assert_eq!(kind(Role::Manager, Role::Manager), Some(DenialKind::PeerOrAbove));
        assert_eq!(kind(Role::Manager, Role::User), Some(DenialKind::InsufficientRole));
        assert_eq!(kind(Role::Member, Role::SubUser), Some(DenialKind::InsufficientRole));
        assert_eq!(kind(Role::Owner, Role::SuperAdmin), None);
    }

    #[test]
    fn test_nobody_impersonates_owner() {
        for actor in Role::ALL {
            assert!(!can_act(actor, Role::Owner, Action::Impersonate));
        }
    }

    #[test]
    fn test_decision_view_serialization() {
        let view = DecisionView::from(&resolve(Role::Owner, Role::Owner, Action::Ban));
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(json, r#"{"allowed":false,"reason":"owner account cannot be banned"}"#);

        let view = DecisionView::from(&resolve(Role::Owner, Role::Member, Action::Ban));
        assert_eq!(serde_json::to_string(&view).unwrap(), r#"{"allowed":true}"#);
    }

    #[test]
    fn test_admin_roles_get_god_mode() {
        assert_eq!(Role::Executive.effective_plan(Plan::Starter), Plan::GodMode);
        assert_eq!(Role::Manager.effective_plan(Plan::Pro), Plan::Pro);
        assert!(Role::Manager.capabilities().manage_team);
        assert!(!Role::Member.capabilities().impersonate);
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert_eq!("god_mode".parse::<Plan>(), Ok(Plan::GodMode));
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Action::Reactivate.resulting_status(), Some(AccountStatus::Active));
    }
}
