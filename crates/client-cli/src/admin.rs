//! Profile and team administration commands.
//!
//! Actions are checked locally with the session's resolver first, so a
//! denied action never reaches the server; the server checks again.

use anyhow::{anyhow, bail, Result};
use shared::{
    session::{SessionContext, SessionError},
    AccountStatus, Action, MemberUpdate, Plan, ProfileUpdate, Role, UserProfile,
};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::Config;

const ROW_ACTIONS: [Action; 6] = [
    Action::Edit,
    Action::Suspend,
    Action::Ban,
    Action::Reactivate,
    Action::Delete,
    Action::Impersonate,
];

fn client(session: &SessionContext, server: &str) -> Result<ApiClient> {
    let token = session
        .token()
        .ok_or_else(|| anyhow!("Not logged in. Run 'prophone login' first."))?;
    Ok(ApiClient::new(server, Some(token)))
}

/// Match a member by id or by (case-insensitive) email.
pub fn find_member<'a>(members: &'a [UserProfile], key: &str) -> Result<&'a UserProfile> {
    let by_id = Uuid::parse_str(key).ok();
    members
        .iter()
        .find(|m| Some(m.id) == by_id || m.email.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow!("No team member matches '{}'", key))
}

/// Actions the session may take on `member`, for display. Reactivate only
/// applies to suspended or banned accounts.
pub fn allowed_actions(session: &SessionContext, member: &UserProfile) -> Vec<Action> {
    ROW_ACTIONS
        .into_iter()
        .filter(|a| *a != Action::Reactivate || member.status != AccountStatus::Active)
        .filter(|a| session.check(member, *a).is_ok())
        .collect()
}

fn explain(err: SessionError) -> anyhow::Error {
    match err {
        SessionError::Denied(denial) => anyhow!("Not allowed: {}", denial),
        other => anyhow!(other),
    }
}

pub async fn show_profile(config: &Config, server: &str) -> Result<()> {
    let session = config.session_context();
    let user = client(&session, server)?.profile().await?;
    println!("{} <{}>", user.name, user.email);
    println!("id:     {}", user.id);
    println!("role:   {}", user.role);
    println!("plan:   {}", user.effective_plan());
    println!("status: {}", user.status);
    if let Some(avatar) = &user.avatar {
        println!("avatar: {}", avatar);
    }
    let caps = user.role.capabilities();
    println!(
        "admin panel: {} · manage team: {} · god mode: {}",
        caps.admin_panel, caps.manage_team, caps.god_mode
    );
    Ok(())
}

pub async fn update_profile(
    config: &Config,
    server: &str,
    name: Option<String>,
    avatar: Option<String>,
) -> Result<()> {
    if name.is_none() && avatar.is_none() {
        bail!("Nothing to update. Pass --name and/or --avatar.");
    }
    let session = config.session_context();
    let user = client(&session, server)?
        .update_profile(&ProfileUpdate { name, avatar })
        .await?;
    println!("\x1b[32m✅ Profile updated\x1b[0m: {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn list_members(config: &Config, server: &str) -> Result<()> {
    let session = config.session_context();
    let members = client(&session, server)?.list_members().await?;

    println!(
        "{:<28} {:<20} {:<12} {:<10} {:<10} ACTIONS",
        "EMAIL", "NAME", "ROLE", "PLAN", "STATUS"
    );
    for member in &members {
        let actions = allowed_actions(&session, member)
            .iter()
            .map(Action::as_str)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<28} {:<20} {:<12} {:<10} {:<10} {}",
            member.email,
            member.name,
            member.role.as_str(),
            member.effective_plan().as_str(),
            member.status.as_str(),
            if actions.is_empty() { "-" } else { &actions }
        );
    }
    Ok(())
}

/// Suspend, ban, reactivate or delete a member.
pub async fn act_on_member(config: &Config, server: &str, key: &str, action: Action) -> Result<()> {
    let session = config.session_context();
    let api = client(&session, server)?;
    let members = api.list_members().await?;
    let target = find_member(&members, key)?;
    session.check(target, action).map_err(explain)?;

    match action {
        Action::Delete => {
            api.delete_member(target.id).await?;
            println!("\x1b[32m✅ Deleted {}\x1b[0m", target.email);
        }
        Action::Suspend | Action::Ban | Action::Reactivate => {
            let updated = api.change_status(target.id, action).await?;
            println!("\x1b[32m✅ {} is now {}\x1b[0m", updated.email, updated.status);
        }
        Action::Edit | Action::Impersonate => {
            bail!("Use 'prophone team edit' or 'prophone impersonate' for {}", action)
        }
    }
    Ok(())
}

pub async fn edit_member(
    config: &Config,
    server: &str,
    key: &str,
    update: MemberUpdate,
) -> Result<()> {
    let session = config.session_context();
    let api = client(&session, server)?;
    let members = api.list_members().await?;
    let target = find_member(&members, key)?;
    session.check(target, Action::Edit).map_err(explain)?;
    if update.role == Some(Role::Owner) {
        bail!("The owner role cannot be assigned");
    }

    let updated = api.update_member(target.id, &update).await?;
    println!(
        "\x1b[32m✅ Updated {}\x1b[0m ({}, {})",
        updated.email, updated.role, updated.plan
    );
    Ok(())
}

/// "Login as" a team member; the real identity is kept for `restore`.
pub async fn impersonate(config: &mut Config, server: &str, key: &str) -> Result<()> {
    let mut session = config.session_context();
    if session.is_impersonating() {
        return Err(explain(SessionError::AlreadyImpersonating));
    }
    let api = client(&session, server)?;
    let members = api.list_members().await?;
    let target = find_member(&members, key)?;
    session.check(target, Action::Impersonate).map_err(explain)?;

    let response = api.impersonate(target.id).await?;
    session
        .impersonate(response.user, response.token)
        .map_err(explain)?;
    config.store_session(&session);
    config.save()?;

    if let Some(current) = session.current() {
        println!(
            "\x1b[35m↪ Now signed in as {} <{}>\x1b[0m",
            current.user.name, current.user.email
        );
    }
    println!("Run '\x1b[1mprophone restore\x1b[0m' to return to your own account");
    Ok(())
}

pub fn restore(config: &mut Config) -> Result<()> {
    let mut session = config.session_context();
    match session.restore_original() {
        Some(user) => println!("\x1b[32m✅ Back to {} <{}>\x1b[0m", user.name, user.email),
        None => {
            println!("Not impersonating anyone");
            return Ok(());
        }
    }
    config.store_session(&session);
    config.save()
}

pub fn parse_plan(value: &str) -> Result<Plan> {
    value.parse().map_err(|e| anyhow!("{}", e))
}

pub fn parse_role(value: &str) -> Result<Role> {
    value.parse().map_err(|e| anyhow!("{}", e))
}
