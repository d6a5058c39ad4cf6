use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inbox::{ChatId, LineId};
use crate::roles::{AccountStatus, Plan, Role};

// ============================================================================
// Relay socket frames
// ============================================================================

/// The only event name the relay forwards.
pub const MESSAGE_EVENT: &str = "message";

/// A frame on the relay socket. The relay does not look inside `data`; it
/// forwards `message` frames to every other connection verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RelayFrame {
    pub fn message(data: serde_json::Value) -> Self {
        Self {
            event: MESSAGE_EVENT.to_string(),
            data,
        }
    }

    pub fn is_message(&self) -> bool {
        self.event == MESSAGE_EVENT
    }

    /// Wrap a chat envelope for sending.
    pub fn chat(envelope: &ChatEnvelope) -> serde_json::Result<Self> {
        Ok(Self::message(serde_json::to_value(envelope)?))
    }

    /// Interpret the payload as a chat envelope. Payloads of any other shape
    /// yield `None` and are meant to be dropped.
    pub fn chat_envelope(&self) -> Option<ChatEnvelope> {
        if !self.is_message() {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// `{lineId, chatId, message}` payload carried by `message` frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnvelope {
    pub line_id: LineId,
    pub chat_id: ChatId,
    pub message: MessagePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

// ============================================================================
// REST: auth & profile
// ============================================================================

/// Missing fields deserialise as empty and are rejected by validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A user as seen by clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: Role,
    pub plan: Plan,
    pub status: AccountStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserProfile {
    /// Plan after God Mode promotion for admin roles.
    pub fn effective_plan(&self) -> Plan {
        self.role.effective_plan(self.plan)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

/// Self-service profile changes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Admin edits of another account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

/// Token for a "login as" session plus who is behind it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpersonationResponse {
    pub user: UserProfile,
    pub token: String,
    pub original_user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicCodeRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicCodeVerifyRequest {
    pub email: String,
    pub code: String,
}

/// Outcome of a magic-code request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagicCodeStatus {
    Sent,
    NotRegistered,
    DeliveryFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicCodeResponse {
    pub status: MagicCodeStatus,
}

/// JSON error body returned by every failing route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<crate::roles::DenialKind>,
}

// ============================================================================
// REST: copilot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopilotRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopilotMessage {
    pub role: CopilotRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotRequest {
    pub messages: Vec<CopilotMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotResponse {
    pub reply: String,
    /// True when the provider failed and the canned reply was used.
    pub fallback: bool,
}

// ============================================================================
// Tests
// ============================================================================
