//! Channel trait — the abstraction over chat platforms.
//!
//! A Channel connects planbot to a messaging surface. It yields inbound user
//! messages and delivers outgoing messages (text, rich attachments, suggested
//! actions, typing indicators). Delivery is fire-and-forget from the core's
//! point of view: a failed delivery is logged, never turned into a failed turn.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ChannelError;

/// Content type used for adaptive card attachments.
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The text content
    pub content: String,

    /// The conversation identifier within the channel
    pub chat_id: String,

    /// Uploaded files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A file or rich card attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// MIME type or card content type
    pub content_type: String,

    /// Where the content lives, for file attachments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Optional filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Inline payload, for cards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

impl Attachment {
    /// An uploaded file referenced by URL.
    pub fn file(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content_type: "application/octet-stream".into(),
            url: Some(url.into()),
            name: Some(name.into()),
            content: None,
        }
    }

    /// An adaptive card with the given JSON body.
    pub fn adaptive_card(content: serde_json::Value) -> Self {
        Self {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE.into(),
            url: None,
            name: None,
            content: Some(content),
        }
    }
}

/// A quick-reply button offered alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: String,
}

impl CardAction {
    /// A button that posts `text` back to the bot when pressed.
    pub fn post_back(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: "postBack".into(),
            title: text.clone(),
            value: text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingKind {
    #[default]
    Message,
    Typing,
}

/// A message the bot sends to a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub kind: OutgoingKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<CardAction>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn attachment(attachment: Attachment) -> Self {
        Self {
            attachments: vec![attachment],
            ..Self::default()
        }
    }

    pub fn typing() -> Self {
        Self {
            kind: OutgoingKind::Typing,
            ..Self::default()
        }
    }
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, message
/// formatting and authentication.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Deliver a message to a specific conversation.
    async fn send(
        &self,
        chat_id: &str,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }

    /// Check if a sender is allowed.
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}

/// A channel handle bound to one conversation.
///
/// Capabilities and the dispatcher use it to talk back to the user during a
/// turn without knowing which platform they are on.
#[derive(Clone)]
pub struct Replier {
    channel: Arc<dyn Channel>,
    chat_id: String,
}

impl Replier {
    pub fn new(channel: Arc<dyn Channel>, chat_id: impl Into<String>) -> Self {
        Self {
            channel,
            chat_id: chat_id.into(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Deliver a message, reporting delivery failures to the caller.
    pub async fn send(&self, message: &OutgoingMessage) -> std::result::Result<(), ChannelError> {
        self.channel.send(&self.chat_id, message).await
    }

    /// Deliver a message; delivery failures are logged and otherwise ignored.
    pub async fn notify(&self, message: OutgoingMessage) {
        if let Err(e) = self.send(&message).await {
            warn!(channel = %self.channel.name(), chat_id = %self.chat_id, error = %e, "Message delivery failed");
        }
    }

    /// Deliver plain text; delivery failures are logged.
    pub async fn notify_text(&self, text: impl Into<String>) {
        self.notify(OutgoingMessage::text(text)).await;
    }

    /// Show a typing indicator; failures are logged.
    pub async fn typing(&self) {
        if let Err(e) = self.channel.send_typing(&self.chat_id).await {
            warn!(channel = %self.channel.name(), error = %e, "Typing indicator failed");
        }
    }
}

impl std::fmt::Debug for Replier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replier")
            .field("channel", &self.channel.name())
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_message_creation() {
        let msg = ChannelMessage {
            channel_id: ChannelId("cli".into()),
            sender_id: "12345".into(),
            sender_name: Some("Alice".into()),
            content: "Hello bot!".into(),
            chat_id: "67890".into(),
            attachments: vec![],
            metadata: serde_json::Map::new(),
        };
        assert_eq!(msg.channel_id.0, "cli");
        assert_eq!(msg.content, "Hello bot!");
    }

    #[test]
    fn adaptive_card_serialization() {
        let card = Attachment::adaptive_card(serde_json::json!({"type": "AdaptiveCard"}));
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["contentType"], ADAPTIVE_CARD_CONTENT_TYPE);
        assert_eq!(json["content"]["type"], "AdaptiveCard");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn post_back_uses_text_for_title_and_value() {
        let action = CardAction::post_back("What can you do?");
        assert_eq!(action.kind, "postBack");
        assert_eq!(action.title, "What can you do?");
        assert_eq!(action.value, "What can you do?");
    }
}
