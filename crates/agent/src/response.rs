//! Outgoing message assembly.

use planbot_core::channel::{Attachment, CardAction, OutgoingMessage};

pub use planbot_capabilities::image_card;

/// The greeting, with one quick reply per suggested question.
///
/// Questions are offered exactly as configured.
pub fn welcome(text: &str, suggested_questions: &[String]) -> OutgoingMessage {
    OutgoingMessage {
        suggested_actions: suggested_questions.iter().map(CardAction::post_back).collect(),
        ..OutgoingMessage::text(text)
    }
}

/// A plain reply.
pub fn reply(text: impl Into<String>, attachments: Vec<Attachment>) -> OutgoingMessage {
    OutgoingMessage {
        attachments,
        ..OutgoingMessage::text(text)
    }
}

/// Acknowledge files uploaded with a message, naming each one.
pub fn uploads_received(uploads: &[Attachment]) -> Option<String> {
    if uploads.is_empty() {
        return None;
    }
    let names: Vec<&str> = uploads
        .iter()
        .map(|a| a.name.as_deref().or(a.url.as_deref()).unwrap_or("unnamed file"))
        .collect();
    Some(format!("Received {} file(s): {}.", uploads.len(), names.join(", ")))
}

/// What the user sees when a turn fails.
pub fn error_text(error: &impl std::fmt::Display) -> String {
    format!("Sorry, something went wrong while processing your request: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use planbot_core::channel::{ADAPTIVE_CARD_CONTENT_TYPE, OutgoingKind};

    #[test]
    fn welcome_offers_questions_as_post_backs() {
        let questions = vec!["Draw a cat".to_string(), "Draw a cat".to_string()];
        let msg = welcome("Hi!", &questions);

        assert_eq!(msg.kind, OutgoingKind::Message);
        assert_eq!(msg.text.as_deref(), Some("Hi!"));
        assert_eq!(msg.suggested_actions.len(), 2);
        assert_eq!(msg.suggested_actions[0].kind, "postBack");
        assert_eq!(msg.suggested_actions[0].title, "Draw a cat");
        assert_eq!(msg.suggested_actions[0].value, "Draw a cat");
    }

    #[test]
    fn welcome_without_questions() {
        assert!(welcome("Hi!", &[]).suggested_actions.is_empty());
    }

    #[test]
    fn reply_carries_attachments() {
        let card = image_card(&["https://img.test/1.png".to_string()]);
        let msg = reply("Here you go", vec![card]);
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].content_type, ADAPTIVE_CARD_CONTENT_TYPE);
    }

    #[test]
    fn uploads_are_acknowledged_by_name() {
        assert_eq!(uploads_received(&[]), None);

        let unnamed = Attachment {
            name: None,
            ..Attachment::file("x", "file:///tmp/data.csv")
        };
        let uploads = [Attachment::file("notes.pdf", "file:///tmp/notes.pdf"), unnamed];
        assert_eq!(
            uploads_received(&uploads).as_deref(),
            Some("Received 2 file(s): notes.pdf, file:///tmp/data.csv.")
        );
    }

    #[test]
    fn error_text_names_the_error() {
        assert_eq!(
            error_text(&"boom"),
            "Sorry, something went wrong while processing your request: boom"
        );
    }
}
