//! CLI authentication: password and magic-code sign-in, sign-out, whoami

use anyhow::{bail, Result};
use reqwest::StatusCode;
use shared::{LoginRequest, MagicCodeStatus, RegisterRequest, UserProfile};
use std::io::{self, BufRead, Write};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;

/// Read one trimmed line from stdin after printing `label`.
pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn save_login(config: &mut Config, user: UserProfile, token: String) -> Result<()> {
    let mut session = config.session_context();
    session.login(user, token);
    config.store_session(&session);
    config.save()
}

fn print_welcome(user: &UserProfile) {
    println!();
    println!("\x1b[1;32m✅ Signed in as {} <{}>\x1b[0m", user.name, user.email);
    println!("\x1b[90mRole: {} · Plan: {}\x1b[0m", user.role, user.effective_plan());
}

pub async fn register(
    config: &mut Config,
    server: &str,
    email: &str,
    name: &str,
    password: &str,
) -> Result<()> {
    let api = ApiClient::new(server, None);
    let auth = api
        .register(&RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        })
        .await?;
    print_welcome(&auth.user);
    save_login(config, auth.user, auth.token)
}

pub async fn login(config: &mut Config, server: &str, email: &str, password: &str) -> Result<()> {
    let api = ApiClient::new(server, None);
    let auth = match api
        .login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    {
        Ok(auth) => auth,
        Err(ApiError::Server { status, message, .. }) if status == StatusCode::FORBIDDEN => {
            bail!("Sign-in blocked: {}", message)
        }
        Err(e) => return Err(e.into()),
    };
    print_welcome(&auth.user);
    save_login(config, auth.user, auth.token)
}

/// Email a one-time code, then exchange it for a session.
pub async fn login_with_code(config: &mut Config, server: &str, email: &str) -> Result<()> {
    let api = ApiClient::new(server, None);
    match api.request_magic_code(email).await? {
        MagicCodeStatus::Sent => {
            println!("\x1b[1;36m📨 A 6-digit sign-in code was sent to {}\x1b[0m", email);
        }
        MagicCodeStatus::NotRegistered => {
            bail!("No account is registered for {}", email);
        }
        MagicCodeStatus::DeliveryFailed => {
            bail!("The sign-in code could not be delivered. Please try again later.");
        }
    }

    let code = prompt("Code: ")?;
    let auth = api.verify_magic_code(email, &code).await?;
    print_welcome(&auth.user);
    save_login(config, auth.user, auth.token)
}

/// Logout by clearing the stored session
pub fn logout(config: &mut Config) -> Result<()> {
    let mut session = config.session_context();
    session.logout();
    config.store_session(&session);
    config.save()?;
    println!("\x1b[32m✅ Logged out successfully\x1b[0m");
    Ok(())
}

/// Show current login status, checked against the server
pub async fn whoami(config: &Config, server: &str) -> Result<()> {
    let session = config.session_context();
    let Some(current) = session.current() else {
        println!("\x1b[33m✗ Not logged in\x1b[0m");
        println!("Run '\x1b[1mprophone login\x1b[0m' to authenticate");
        return Ok(());
    };

    let api = ApiClient::new(server, Some(&current.token));
    match api.profile().await {
        Ok(user) => {
            println!("\x1b[32m✓ Logged in\x1b[0m as {} <{}>", user.name, user.email);
            println!("Role: {}", user.role);
            println!("Plan: {}", user.effective_plan());
            println!("Status: {}", user.status);
        }
        Err(e) if matches!(e.status(), Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)) => {
            println!("\x1b[33m✗ Session is no longer valid: {}\x1b[0m", e);
            println!("Run '\x1b[1mprophone login\x1b[0m' to sign in again");
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(original) = session.original_user() {
        println!(
            "\x1b[35m↺ Signed in as another user. Your account: {} <{}>\x1b[0m",
            original.name, original.email
        );
        println!("Run '\x1b[1mprophone restore\x1b[0m' to switch back");
    }
    println!("Server: {}", server);
    Ok(())
}
