//! Chat-completion client behind the copilot widget.
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. The widget
//! never sees provider errors: any failure is logged and replaced by a fixed
//! reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{CopilotMessage, CopilotResponse, CopilotRole};
use thiserror::Error;

use crate::config::CopilotConfig;

pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now. Please try again in a moment.";

const SYSTEM_PROMPT: &str = "You are ProPhone Copilot, an assistant for a phone, messaging and CRM \
dashboard. Help with drafting texts, organising pipelines and answering product questions. Keep \
answers short.";

#[derive(Debug, Error)]
pub enum CopilotError {
    #[error("copilot is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider returned no choices")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<&'a CopilotMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: CopilotMessage,
}

#[derive(Clone)]
pub struct CopilotClient {
    client: reqwest::Client,
    config: CopilotConfig,
    system: CopilotMessage,
}

impl CopilotClient {
    pub fn new(config: CopilotConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            config,
            system: CopilotMessage {
                role: CopilotRole::System,
                content: SYSTEM_PROMPT.to_string(),
            },
        }
    }

    /// Reply to a conversation, substituting the canned reply on any failure.
    pub async fn reply(&self, messages: &[CopilotMessage]) -> CopilotResponse {
        match self.complete(messages).await {
            Ok(reply) => CopilotResponse {
                reply,
                fallback: false,
            },
            Err(CopilotError::NotConfigured) => {
                tracing::debug!("Copilot has no API key, using fallback reply");
                Self::fallback()
            }
            Err(e) => {
                tracing::warn!("Copilot request failed: {}", e);
                Self::fallback()
            }
        }
    }

    fn fallback() -> CopilotResponse {
        CopilotResponse {
            reply: FALLBACK_REPLY.to_string(),
            fallback: true,
        }
    }

    async fn complete(&self, messages: &[CopilotMessage]) -> Result<String, CopilotError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(CopilotError::NotConfigured)?;

        let request = CompletionRequest {
            model: &self.config.model,
            messages: std::iter::once(&self.system).chain(messages).collect(),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CopilotError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(CopilotError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_uses_fallback() {
        let client = CopilotClient::new(CopilotConfig::default());
        let response = client
            .reply(&[CopilotMessage {
                role: CopilotRole::User,
                content: "hello".to_string(),
            }])
            .await;
        assert!(response.fallback);
        assert_eq!(response.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_unreachable_provider_uses_fallback() {
        let client = CopilotClient::new(CopilotConfig {
            api_key: Some("sk-test".to_string()),
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..CopilotConfig::default()
        });
        let response = client.reply(&[]).await;
        assert!(response.fallback);
    }

    #[test]
    fn test_completion_parsing() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Sure!"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Sure!");
        assert_eq!(parsed.choices[0].message.role, CopilotRole::Assistant);
    }
}
