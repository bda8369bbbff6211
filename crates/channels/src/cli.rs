//! CLI channel — interactive terminal-based chat.
//!
//! This is the simplest channel: reads from stdin, writes to stdout.
//! Used for `planbot chat` interactive mode.
//!
//! A line of the form `/upload <path>` is delivered as a message with a file
//! attachment and no text.

use async_trait::async_trait;
use planbot_core::channel::{
    ADAPTIVE_CARD_CONTENT_TYPE, Attachment, Channel, ChannelId, ChannelMessage, OutgoingKind,
    OutgoingMessage,
};
use planbot_core::error::ChannelError;
use std::fmt::Write as _;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// The conversation id used for the single local session.
pub const CLI_CHAT_ID: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one line of user input into an inbound message.
///
/// Returns `None` for blank lines.
pub fn parse_line(channel_id: &ChannelId, line: &str) -> Option<ChannelMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (content, attachments) = match line.strip_prefix("/upload ") {
        Some(path) => {
            let path = path.trim();
            let name = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path);
            (String::new(), vec![Attachment::file(name, format!("file://{path}"))])
        }
        None => (line.to_string(), vec![]),
    };

    Some(ChannelMessage {
        channel_id: channel_id.clone(),
        sender_id: "local_user".into(),
        sender_name: Some("User".into()),
        content,
        chat_id: CLI_CHAT_ID.into(),
        attachments,
        metadata: serde_json::Map::new(),
    })
}

/// Render an outgoing message as terminal text.
pub fn render(message: &OutgoingMessage) -> String {
    let mut out = String::new();

    if let Some(text) = &message.text {
        out.push_str(text);
    }

    for attachment in &message.attachments {
        if !out.is_empty() {
            out.push('\n');
        }
        if attachment.content_type == ADAPTIVE_CARD_CONTENT_TYPE {
            render_card(&mut out, attachment.content.as_ref());
        } else {
            let name = attachment.name.as_deref().unwrap_or("attachment");
            let url = attachment.url.as_deref().unwrap_or("");
            let _ = write!(out, "[{name}] {url}");
        }
    }

    for action in &message.suggested_actions {
        let _ = write!(out, "\n  > {}", action.title);
    }

    out
}

fn render_card(out: &mut String, content: Option<&serde_json::Value>) {
    let Some(body) = content.and_then(|c| c["body"].as_array()) else {
        out.push_str("[card]");
        return;
    };

    let lines: Vec<String> = body
        .iter()
        .filter_map(|element| match element["type"].as_str() {
            Some("TextBlock") => element["text"].as_str().map(String::from),
            Some("Image") => element["url"].as_str().map(|url| format!("[image] {url}")),
            _ => None,
        })
        .collect();
    out.push_str(&lines.join("\n"));
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        // Check for exit commands
                        if matches!(line.trim(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                            break;
                        }

                        let Some(msg) = parse_line(&channel_id, &line) else {
                            continue;
                        };

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
        if message.kind == OutgoingKind::Typing {
            return Ok(());
        }
        println!("{}\n", render(message));
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // CLI is always allowed (local user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbot_core::channel::CardAction;

    #[test]
    fn cli_channel_properties() {
        let ch = CliChannel::new();
        assert_eq!(ch.name(), "cli");
        assert_eq!(ch.id().0, "cli");
        assert!(ch.is_allowed("anyone"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let id = ChannelId("cli".into());
        assert!(parse_line(&id, "   ").is_none());
        let msg = parse_line(&id, "  hello ").unwrap();
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.chat_id, CLI_CHAT_ID);
    }

    #[test]
    fn upload_becomes_attachment() {
        let id = ChannelId("cli".into());
        let msg = parse_line(&id, "/upload /tmp/report.pdf").unwrap();
        assert!(msg.content.is_empty());
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].name.as_deref(), Some("report.pdf"));
        assert_eq!(msg.attachments[0].url.as_deref(), Some("file:///tmp/report.pdf"));
    }

    #[test]
    fn renders_card_and_actions() {
        let card = serde_json::json!({
            "type": "AdaptiveCard",
            "version": "1.0",
            "body": [
                {"type": "TextBlock", "text": "Here are the generated images.", "size": "large"},
                {"type": "Image", "url": "https://img/1.png"}
            ]
        });
        let mut message = OutgoingMessage::attachment(Attachment::adaptive_card(card));
        message.suggested_actions = vec![CardAction::post_back("Draw a cat")];

        assert_eq!(
            render(&message),
            "Here are the generated images.\n[image] https://img/1.png\n  > Draw a cat"
        );
    }

    #[test]
    fn renders_plain_text() {
        assert_eq!(render(&OutgoingMessage::text("hi")), "hi");
    }
}
