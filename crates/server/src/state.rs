use crate::{config::Config, copilot::CopilotClient, db::Database, relay::RelayHub};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Pending magic sign-in code, keyed by email
#[derive(Debug, Clone)]
pub struct MagicCodeState {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// Wrong guesses so far
    pub attempts: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub relay: Arc<RelayHub>,
    pub magic_codes: Arc<DashMap<String, MagicCodeState>>,
    pub copilot: CopilotClient,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let copilot = CopilotClient::new(config.copilot.clone());
        Self {
            db,
            config,
            relay: Arc::new(RelayHub::new()),
            magic_codes: Arc::new(DashMap::new()),
            copilot,
        }
    }
}
