use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use shared::session::{SessionContext, SessionSnapshot};
use std::path::PathBuf;

pub const DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Signed-in identity, and the real one behind it while impersonating
    #[serde(default)]
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base HTTP URL of the API server
    pub server: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("app", "prophone", "prophone")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Server from the command line, then config, then the default.
    pub fn server_url(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| self.remote.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext::from_snapshot(self.session.clone())
    }

    pub fn store_session(&mut self, session: &SessionContext) {
        self.session = session.snapshot();
    }
}

/// `http(s)://host` to the relay socket URL for that host.
pub fn relay_url(server: &str, token: &str) -> String {
    let base = server
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws/relay?token={}", base, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{AccountStatus, Plan, Role, UserProfile};
    use uuid::Uuid;

    #[test]
    fn test_server_url_precedence() {
        let mut config = Config::default();
        assert_eq!(config.server_url(None), DEFAULT_SERVER);
        config.remote.server = Some("https://api.prophone.app/".to_string());
        assert_eq!(config.server_url(None), "https://api.prophone.app");
        assert_eq!(
            config.server_url(Some("http://127.0.0.1:5000")),
            "http://127.0.0.1:5000"
        );
    }

    #[test]
    fn test_relay_url() {
        assert_eq!(
            relay_url("http://localhost:5000", "abc"),
            "ws://localhost:5000/ws/relay?token=abc"
        );
        assert_eq!(
            relay_url("https://api.prophone.app/", "abc"),
            "wss://api.prophone.app/ws/relay?token=abc"
        );
    }

    #[test]
    fn test_session_survives_toml() {
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            name: "A".to_string(),
            avatar: None,
            role: Role::Manager,
            plan: Plan::Pro,
            status: AccountStatus::Active,
            created_at: None,
        };
        let mut session = SessionContext::new();
        session.login(user.clone(), "tok".to_string());

        let mut config = Config::default();
        config.store_session(&session);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        let restored = parsed.session_context();
        assert_eq!(restored.token(), Some("tok"));
        assert_eq!(restored.current().map(|s| &s.user), Some(&user));
        assert!(!restored.is_impersonating());
    }
}
