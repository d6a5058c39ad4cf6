use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub copilot: CopilotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed browser origin; any origin when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// The account registered with this email becomes the platform owner
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default = "default_magic_code_ttl")]
    pub magic_code_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    /// Use local sendmail binary instead of SMTP server
    #[serde(default = "default_true")]
    pub use_sendmail: bool,
    /// SMTP server host (only used if use_sendmail is false)
    #[serde(default)]
    pub host: String,
    /// SMTP server port (only used if use_sendmail is false)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotConfig {
    /// No key means every request gets the canned reply
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_copilot_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_copilot_model")]
    pub model: String,
    #[serde(default = "default_copilot_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool { true }
fn default_smtp_port() -> u16 { 587 }
fn default_magic_code_ttl() -> i64 { 10 }
fn default_copilot_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_copilot_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_copilot_timeout() -> u64 { 30 }

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: true,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "noreply@prophone.app".to_string(),
            from_name: "ProPhone".to_string(),
        }
    }
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_copilot_endpoint(),
            model: default_copilot_model(),
            timeout_secs: default_copilot_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                cors_origin: None,
            },
            database: DatabaseConfig {
                path: "./data/prophone.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24,
                owner_email: None,
                magic_code_ttl_minutes: default_magic_code_ttl(),
            },
            smtp: SmtpConfig::default(),
            copilot: CopilotConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("PROPHONE_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("prophone-server.toml"),
            PathBuf::from("config/prophone-server.toml"),
            PathBuf::from("/etc/prophone/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Environment variables win over the file.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(origin) = var("CORS_ORIGIN") {
            self.server.cors_origin = Some(origin);
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(email) = var("OWNER_EMAIL") {
            self.auth.owner_email = Some(email);
        }
        if let Some(host) = var("EMAIL_HOST") {
            self.smtp.host = host;
        }
        if let (Some(user), Some(password)) = (var("EMAIL_HOST_USER"), var("EMAIL_HOST_PASSWORD")) {
            self.smtp.enabled = true;
            self.smtp.use_sendmail = false;
            self.smtp.from_email = user.clone();
            self.smtp.username = user;
            self.smtp.password = password;
        }
        if let Some(key) = var("OPENAI_API_KEY").or_else(|| var("VITE_OPENAI_API_KEY")) {
            self.copilot.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8088"),
            ("CORS_ORIGIN", "http://localhost:5173"),
            ("EMAIL_HOST_USER", "bot@prophone.app"),
            ("EMAIL_HOST_PASSWORD", "pw"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.cors_origin.as_deref(), Some("http://localhost:5173"));
        assert!(config.smtp.enabled);
        assert!(!config.smtp.use_sendmail);
        assert_eq!(config.smtp.username, "bot@prophone.app");
        assert_eq!(config.copilot.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            path = "/tmp/p.db"

            [auth]
            jwt_secret = "x"
            token_expiry_hours = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.magic_code_ttl_minutes, 10);
        assert!(!config.smtp.enabled);
        assert!(config.copilot.api_key.is_none());
        assert_eq!(config.copilot.model, "gpt-3.5-turbo");
    }
}
