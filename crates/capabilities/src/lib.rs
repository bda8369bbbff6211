//! Capability handlers for planbot.
//!
//! Each capability wraps one external service behind the
//! `planbot_core::Capability` trait:
//!
//! - **generate_images** — text-to-image, delivered as an adaptive card
//! - **query_database** — read-only SQL over SQLite
//! - **search_documents** — hybrid search over a document index
//! - **search_web** — Bing web search
//! - **answer_directly** — conversational reply (direct planner only)
//!
//! [`registry::build`] wires the configured ones for a turn.

pub mod direct_answer;
pub mod document_search;
pub mod image_generation;
pub mod registry;
pub mod sql_query;
pub mod web_search;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use direct_answer::DirectAnswerCapability;
pub use document_search::{AzureSearchIndex, DocumentSearchCapability};
pub use image_generation::{ImageGenerationCapability, image_card};
pub use registry::{CapabilityServices, TurnScope, build};
pub use sql_query::{SqlQueryCapability, SqliteSqlBackend};
pub use web_search::{BingWebSearch, WebSearchCapability};
