//! Chat channel implementations for planbot.
//!
//! Each channel connects to a chat platform and relays messages to/from
//! the bot. Channels are trait-based and platform-agnostic.
//!
//! Available channels:
//! - **CLI** — Interactive terminal chat (stdin/stdout)

pub mod cli;

pub use cli::{CLI_CHAT_ID, CliChannel};
