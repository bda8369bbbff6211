//! # planbot Core
//!
//! Domain types, traits, and error definitions for the planbot conversational
//! planner. It defines the domain model that all other crates implement
//! against, and pulls in nothing heavier than tokio's sync primitives.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, chat channel, image
//! generator, translator, search and SQL backends, conversation storage) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod channel;
pub mod error;
pub mod message;
pub mod provider;
pub mod service;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use capability::{
    BoundArguments, Capability, CapabilityCall, CapabilityRegistry, ExecutionResult, ParamSpec,
    ParamType,
};
pub use channel::{Attachment, CardAction, Channel, ChannelId, ChannelMessage, OutgoingMessage, Replier};
pub use error::{CapabilityError, ChannelError, Error, PlanError, ProviderError, Result};
pub use message::{ConversationData, ConversationId, ConversationTurn, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use service::{DocumentHit, DocumentIndex, ImageGenerator, SqlBackend, Translator, WebHit, WebSearchBackend};
pub use store::{ConversationStore, InMemoryConversationStore};
