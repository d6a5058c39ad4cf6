//! Phone inbox state: lines own chats, chats own messages.
//!
//! The inbox has a single owner (the UI loop); every transition is a plain
//! `&mut self` method. A line's unread count is always derived from its
//! chats and is never stored separately.
//!
//! Selection is a tagged variant: either nothing, a persisted chat, or a
//! draft under construction. Drafts never live inside a line's chat list, so
//! discarding one cannot leave anything behind, and promoting one is a
//! by-value conversion [`Draft::promote`].

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::messages::{ChatEnvelope, MessagePayload};
use crate::phone::{format_as_typed, PhoneNumber, PhoneNumberError};

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

/// CRM pipeline tag attached to a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatTag {
    New,
    Hot,
    Warm,
    FollowUp,
    Prospecting,
    AppointmentSet,
    NeedsAnalysis,
    MakeOffer,
    NotInterested,
    Dnc,
    Conversion,
}

impl ChatTag {
    pub const ALL: [ChatTag; 11] = [
        ChatTag::New,
        ChatTag::Hot,
        ChatTag::Warm,
        ChatTag::FollowUp,
        ChatTag::Prospecting,
        ChatTag::AppointmentSet,
        ChatTag::NeedsAnalysis,
        ChatTag::MakeOffer,
        ChatTag::NotInterested,
        ChatTag::Dnc,
        ChatTag::Conversion,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChatTag::New => "New",
            ChatTag::Hot => "Hot",
            ChatTag::Warm => "Warm",
            ChatTag::FollowUp => "Follow-up",
            ChatTag::Prospecting => "Prospecting",
            ChatTag::AppointmentSet => "Appointment Set",
            ChatTag::NeedsAnalysis => "Needs Analysis",
            ChatTag::MakeOffer => "Make Offer",
            ChatTag::NotInterested => "Not Interested",
            ChatTag::Dnc => "DNC",
            ChatTag::Conversion => "Conversion",
        }
    }

    /// Next tag in the vocabulary, `None` after the last one.
    pub fn cycle(tag: Option<ChatTag>) -> Option<ChatTag> {
        match tag {
            None => Some(ChatTag::ALL[0]),
            Some(t) => {
                let idx = ChatTag::ALL.iter().position(|x| *x == t).unwrap_or(0);
                ChatTag::ALL.get(idx + 1).copied()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl Message {
    pub fn sent(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sent_at: Utc::now(),
            direction: Direction::Sent,
            status: Some(DeliveryStatus::Sent),
        }
    }

    pub fn received(content: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sent_at,
            direction: Direction::Received,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterparty {
    Contact { name: String, number: String },
    Group { name: String, member_count: u32 },
}

impl Counterparty {
    pub fn name(&self) -> &str {
        match self {
            Counterparty::Contact { name, .. } | Counterparty::Group { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    id: ChatId,
    line_id: LineId,
    counterparty: Counterparty,
    messages: Vec<Message>,
    unread: u32,
    tag: Option<ChatTag>,
}

impl Chat {
    pub fn new(id: ChatId, line_id: LineId, counterparty: Counterparty) -> Self {
        Self {
            id,
            line_id,
            counterparty,
            messages: Vec::new(),
            unread: 0,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_unread(mut self, unread: u32) -> Self {
        self.unread = unread;
        self
    }

    pub fn with_tag(mut self, tag: ChatTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn id(&self) -> &ChatId {
        &self.id
    }

    pub fn line_id(&self) -> &LineId {
        &self.line_id
    }

    pub fn counterparty(&self) -> &Counterparty {
        &self.counterparty
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn tag(&self) -> Option<ChatTag> {
        self.tag
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Short preview of the last message for list views.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.last_message() {
            Some(m) if m.content.chars().count() > max_chars => {
                let cut: String = m.content.chars().take(max_chars).collect();
                format!("{cut}…")
            }
            Some(m) => m.content.clone(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneLine {
    id: LineId,
    name: String,
    number: String,
    chats: Vec<Chat>,
}

impl PhoneLine {
    pub fn new(id: impl Into<String>, name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id: LineId(id.into()),
            name: name.into(),
            number: number.into(),
            chats: Vec::new(),
        }
    }

    /// Attach a seeded chat. The chat is re-bound to this line.
    pub fn with_chat(mut self, mut chat: Chat) -> Self {
        chat.line_id = self.id.clone();
        self.chats.push(chat);
        self
    }

    pub fn id(&self) -> &LineId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn unread(&self) -> u32 {
        self.chats.iter().map(|c| c.unread).sum()
    }

    fn chat_mut(&mut self, chat_id: &ChatId) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| &c.id == chat_id)
    }
}

// ============================================================================
// Draft & selection
// ============================================================================

/// A new conversation under construction. Not a chat until promoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    line_id: LineId,
    input: String,
    #[serde(skip)]
    error: Option<PhoneNumberError>,
}

impl Draft {
    fn new(line_id: LineId) -> Self {
        Self {
            line_id,
            input: String::new(),
            error: None,
        }
    }

    pub fn line_id(&self) -> &LineId {
        &self.line_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Destination as it should be displayed while typing.
    pub fn display(&self) -> String {
        format_as_typed(&self.input)
    }

    /// Inline validation message from the last rejected promotion.
    pub fn validation_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// Turn the draft into a real chat with a fresh id and no messages.
    pub fn promote(self, number: PhoneNumber) -> Chat {
        let display = number.to_string();
        Chat::new(
            ChatId::generate(),
            self.line_id,
            Counterparty::Contact {
                name: display.clone(),
                number: display,
            },
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    None,
    Chat(ChatId),
    Draft(Draft),
}

/// How a draft was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Blur,
    OutsideClick,
    Cancel,
}

/// Per-chat view state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// Not selected, nothing unread.
    Idle,
    /// Selected; unread is pinned at zero.
    Active,
    /// Not selected with unread messages waiting.
    Background,
}

/// Raised when an inbound message lands in a chat that is not on screen
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub line_id: LineId,
    pub chat_id: ChatId,
    pub from: String,
    pub preview: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum InboxError {
    #[error("unknown phone line: {0}")]
    UnknownLine(LineId),
    #[error("unknown chat: {0}")]
    UnknownChat(ChatId),
    #[error("select a phone line first")]
    NoLineSelected,
    #[error("no new message in progress")]
    NoDraft,
    #[error("no conversation selected")]
    NoActiveChat,
    #[error("message is empty")]
    EmptyMessage,
    #[error("{0}")]
    InvalidNumber(#[from] PhoneNumberError),
}

// ============================================================================
// Inbox
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Inbox {
    lines: Vec<PhoneLine>,
    selected_line: Option<LineId>,
    selection: Selection,
}

impl Inbox {
    /// Build from seed lines; the first line starts selected.
    pub fn new(lines: Vec<PhoneLine>) -> Self {
        let selected_line = lines.first().map(|l| l.id.clone());
        Self {
            lines,
            selected_line,
            selection: Selection::None,
        }
    }

    pub fn lines(&self) -> &[PhoneLine] {
        &self.lines
    }

    pub fn line(&self, line_id: &LineId) -> Option<&PhoneLine> {
        self.lines.iter().find(|l| &l.id == line_id)
    }

    pub fn selected_line(&self) -> Option<&PhoneLine> {
        self.selected_line.as_ref().and_then(|id| self.line(id))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn draft(&self) -> Option<&Draft> {
        match &self.selection {
            Selection::Draft(d) => Some(d),
            _ => None,
        }
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        match &self.selection {
            Selection::Chat(id) => self.chat(id),
            _ => None,
        }
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.lines
            .iter()
            .flat_map(|l| l.chats.iter())
            .find(|c| &c.id == chat_id)
    }

    pub fn total_unread(&self) -> u32 {
        self.lines.iter().map(PhoneLine::unread).sum()
    }

    pub fn is_drafting(&self) -> bool {
        matches!(self.selection, Selection::Draft(_))
    }

    pub fn chat_state(&self, chat_id: &ChatId) -> Option<ChatState> {
        let chat = self.chat(chat_id)?;
        Some(match &self.selection {
            Selection::Chat(id) if id == chat_id => ChatState::Active,
            _ if chat.unread > 0 => ChatState::Background,
            _ => ChatState::Idle,
        })
    }

    /// Switch lines. Any draft is discarded and a chat from another line is
    /// deselected.
    pub fn select_line(&mut self, line_id: &LineId) -> Result<(), InboxError> {
        if self.line(line_id).is_none() {
            return Err(InboxError::UnknownLine(line_id.clone()));
        }
        let keep = matches!(
            &self.selection,
            Selection::Chat(id) if self.chat(id).is_some_and(|c| &c.line_id == line_id)
        );
        if !keep {
            self.selection = Selection::None;
        }
        self.selected_line = Some(line_id.clone());
        Ok(())
    }

    /// Make `chat_id` the active chat and zero its unread counter.
    pub fn select_chat(&mut self, chat_id: &ChatId) -> Result<(), InboxError> {
        let line_idx = self
            .lines
            .iter()
            .position(|l| l.chats.iter().any(|c| &c.id == chat_id))
            .ok_or_else(|| InboxError::UnknownChat(chat_id.clone()))?;
        let line = &mut self.lines[line_idx];
        if let Some(chat) = line.chat_mut(chat_id) {
            chat.unread = 0;
        }
        self.selected_line = Some(line.id.clone());
        self.selection = Selection::Chat(chat_id.clone());
        tracing::debug!(chat = %chat_id, line = %line.id, "chat selected");
        Ok(())
    }

    /// Begin composing to a new number on the selected line. Replaces any
    /// existing draft, so at most one exists.
    pub fn start_new_message(&mut self) -> Result<&Draft, InboxError> {
        let line_id = self.selected_line.clone().ok_or(InboxError::NoLineSelected)?;
        self.selection = Selection::Draft(Draft::new(line_id));
        match &self.selection {
            Selection::Draft(d) => Ok(d),
            _ => Err(InboxError::NoDraft),
        }
    }

    /// Replace the draft's destination input. Returns the display form.
    pub fn update_draft(&mut self, input: &str) -> Result<String, InboxError> {
        match &mut self.selection {
            Selection::Draft(draft) => {
                draft.input = input.to_string();
                draft.error = None;
                Ok(draft.display())
            }
            _ => Err(InboxError::NoDraft),
        }
    }

    /// Promote the draft into a real chat and select it. An incomplete number
    /// leaves the draft in place with a validation message.
    pub fn promote_draft(&mut self) -> Result<ChatId, InboxError> {
        let number = match &mut self.selection {
            Selection::Draft(draft) => match PhoneNumber::parse(&draft.input) {
                Ok(number) => number,
                Err(e) => {
                    draft.error = Some(e.clone());
                    return Err(InboxError::InvalidNumber(e));
                }
            },
            _ => return Err(InboxError::NoDraft),
        };

        let Selection::Draft(draft) = std::mem::take(&mut self.selection) else {
            return Err(InboxError::NoDraft);
        };
        let line_idx = self
            .lines
            .iter()
            .position(|l| l.id == draft.line_id)
            .ok_or_else(|| InboxError::UnknownLine(draft.line_id.clone()))?;

        let chat = draft.promote(number);
        let chat_id = chat.id.clone();
        self.lines[line_idx].chats.insert(0, chat);
        self.selection = Selection::Chat(chat_id.clone());
        tracing::info!(chat = %chat_id, "new conversation started");
        Ok(chat_id)
    }

    /// Drop the draft without creating anything. Returns whether one existed.
    pub fn discard_draft(&mut self, reason: DiscardReason) -> bool {
        if self.is_drafting() {
            self.selection = Selection::None;
            tracing::debug!(?reason, "draft discarded");
            true
        } else {
            false
        }
    }

    /// Apply a message delivered by the relay.
    pub fn receive(&mut self, envelope: ChatEnvelope) -> Result<Option<Notification>, InboxError> {
        let is_active = matches!(&self.selection, Selection::Chat(id) if *id == envelope.chat_id);
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == envelope.line_id)
            .ok_or_else(|| InboxError::UnknownLine(envelope.line_id.clone()))?;
        let chat = line
            .chat_mut(&envelope.chat_id)
            .ok_or_else(|| InboxError::UnknownChat(envelope.chat_id.clone()))?;

        let message = Message::received(envelope.message.content, envelope.message.sent_at);
        chat.messages.push(message);

        if is_active {
            return Ok(None);
        }
        chat.unread += 1;
        Ok(Some(Notification {
            line_id: envelope.line_id,
            chat_id: envelope.chat_id,
            from: chat.counterparty.name().to_string(),
            preview: chat.preview(40),
        }))
    }

    /// Append an outgoing message to the active chat and return the relay
    /// payload. The message is shown immediately; nothing confirms delivery.
    pub fn send(&mut self, content: &str) -> Result<ChatEnvelope, InboxError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(InboxError::EmptyMessage);
        }
        let Selection::Chat(chat_id) = &self.selection else {
            return Err(InboxError::NoActiveChat);
        };
        let chat_id = chat_id.clone();
        let chat = self
            .lines
            .iter_mut()
            .find_map(|l| l.chat_mut(&chat_id))
            .ok_or_else(|| InboxError::UnknownChat(chat_id.clone()))?;

        let message = Message::sent(content);
        let envelope = ChatEnvelope {
            line_id: chat.line_id.clone(),
            chat_id,
            message: MessagePayload {
                id: message.id,
                content: message.content.clone(),
                sent_at: message.sent_at,
            },
        };
        chat.messages.push(message);
        Ok(envelope)
    }

    /// Delivery status is the only thing that may change on a message.
    pub fn mark_delivery(
        &mut self,
        chat_id: &ChatId,
        message_id: Uuid,
        status: DeliveryStatus,
    ) -> Result<(), InboxError> {
        let chat = self
            .lines
            .iter_mut()
            .find_map(|l| l.chat_mut(chat_id))
            .ok_or_else(|| InboxError::UnknownChat(chat_id.clone()))?;
        if let Some(m) = chat
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.direction == Direction::Sent)
        {
            m.status = Some(status);
        }
        Ok(())
    }

    pub fn set_tag(&mut self, chat_id: &ChatId, tag: Option<ChatTag>) -> Result<(), InboxError> {
        let chat = self
            .lines
            .iter_mut()
            .find_map(|l| l.chat_mut(chat_id))
            .ok_or_else(|| InboxError::UnknownChat(chat_id.clone()))?;
        chat.tag = tag;
        Ok(())
    }

    /// Demo lines and conversations loaded at startup.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let ago = |mins: i64| now - Duration::minutes(mins);

        let sales = PhoneLine::new("line-sales", "Sales", "(555) 010-2000")
            .with_chat(
                Chat::new(
                    "chat-jane".into(),
                    "line-sales".into(),
                    Counterparty::Contact {
                        name: "Jane Cooper".to_string(),
                        number: "(555) 201-3344".to_string(),
                    },
                )
                .with_message(Message::received("Hi, is the listing still available?", ago(42)))
                .with_message(Message::received("I can come by tomorrow afternoon.", ago(40)))
                .with_unread(2)
                .with_tag(ChatTag::Hot),
            )
            .with_chat(
                Chat::new(
                    "chat-robert".into(),
                    "line-sales".into(),
                    Counterparty::Contact {
                        name: "Robert Fox".to_string(),
                        number: "(555) 867-5309".to_string(),
                    },
                )
                .with_message(Message::received("Can you send over the pricing sheet?", ago(180)))
                .with_tag(ChatTag::FollowUp),
            );

        let support = PhoneLine::new("line-support", "Support", "(555) 010-3000")
            .with_chat(
                Chat::new(
                    "chat-team".into(),
                    "line-support".into(),
                    Counterparty::Group {
                        name: "Onboarding Crew".to_string(),
                        member_count: 4,
                    },
                )
                .with_message(Message::received("Welcome call moved to 3pm.", ago(15)))
                .with_unread(1),
            )
            .with_chat(Chat::new(
                "chat-empty".into(),
                "line-support".into(),
                Counterparty::Contact {
                    name: "Wade Warren".to_string(),
                    number: "(555) 443-1200".to_string(),
                },
            ));

        Self::new(vec![sales, support])
    }
}
