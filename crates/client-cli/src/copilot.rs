//! Copilot chat from the terminal

use anyhow::{anyhow, Result};
use shared::{CopilotMessage, CopilotRole};

use crate::api::ApiClient;
use crate::auth::prompt;
use crate::config::Config;

/// One question, or a conversation until an empty line when none is given.
pub async fn run(config: &Config, server: &str, question: Option<String>) -> Result<()> {
    let session = config.session_context();
    let token = session
        .token()
        .ok_or_else(|| anyhow!("Not logged in. Run 'prophone login' first."))?;
    let api = ApiClient::new(server, Some(token));

    let mut history: Vec<CopilotMessage> = Vec::new();
    let one_shot = question.is_some();
    let mut next = question;

    loop {
        let text = match next.take() {
            Some(text) => text,
            None => prompt("\x1b[1;36myou>\x1b[0m ")?,
        };
        if text.is_empty() {
            break;
        }
        history.push(CopilotMessage {
            role: CopilotRole::User,
            content: text,
        });

        let response = api.copilot(history.clone()).await?;
        if response.fallback {
            println!("\x1b[90mcopilot> {}\x1b[0m", response.reply);
        } else {
            println!("\x1b[1;35mcopilot>\x1b[0m {}", response.reply);
        }
        history.push(CopilotMessage {
            role: CopilotRole::Assistant,
            content: response.reply,
        });

        if one_shot {
            break;
        }
    }
    Ok(())
}
