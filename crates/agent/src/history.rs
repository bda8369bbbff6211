//! Conversation history serialization for planner prompts.
//!
//! Token counts use a character heuristic: ~4 characters per token, rounded
//! up. That is within ~10% for BPE tokenizers on English text, which is all a
//! budget check needs.

use planbot_core::message::ConversationTurn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

fn render_turn(turn: &ConversationTurn) -> String {
    format!("{}: {}", turn.role.as_str(), turn.text)
}

/// Render turns as `role: text` lines, oldest first.
///
/// When the rendering exceeds `budget_tokens`, the oldest turns are dropped
/// until it fits. The latest turn is always kept, even on its own over budget.
pub fn serialize(turns: &[ConversationTurn], budget_tokens: usize) -> String {
    let lines: Vec<String> = turns.iter().map(render_turn).collect();

    // Walk backwards, keeping turns while they fit. Each line costs one extra
    // token for its separator.
    let mut used = 0usize;
    let mut first_kept = lines.len();
    for (i, line) in lines.iter().enumerate().rev() {
        let cost = estimate_tokens(line) + 1;
        if used + cost > budget_tokens && first_kept < lines.len() {
            break;
        }
        used += cost;
        first_kept = i;
    }

    lines[first_kept..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn chronological_role_prefixed_lines() {
        let turns = vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::assistant("Hello! How can I help?"),
            ConversationTurn::user("Draw a cat"),
        ];
        assert_eq!(
            serialize(&turns, 1000),
            "user: Hi\nassistant: Hello! How can I help?\nuser: Draw a cat"
        );
    }

    #[test]
    fn oldest_turns_dropped_first() {
        let turns = vec![
            ConversationTurn::user("a".repeat(400)),
            ConversationTurn::assistant("short reply"),
            ConversationTurn::user("latest question"),
        ];
        let out = serialize(&turns, 20);
        assert_eq!(out, "assistant: short reply\nuser: latest question");
    }

    #[test]
    fn latest_turn_always_kept() {
        let turns = vec![
            ConversationTurn::user("old"),
            ConversationTurn::user("b".repeat(1000)),
        ];
        let out = serialize(&turns, 10);
        assert!(out.starts_with("user: bbbb"));
        assert!(!out.contains("old"));
    }

    #[test]
    fn empty_history() {
        assert_eq!(serialize(&[], 100), "");
    }
}
