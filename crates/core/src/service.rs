//! External services behind the capabilities.
//!
//! Each trait is the narrow contract one capability needs from its backend.
//! A deployment wires whichever of these it has configured; the registry
//! builder omits capabilities whose backend is missing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// Text-to-image generation. One call produces one image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image and return its URL.
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError>;
}

/// Machine translation.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into the language with canonical code `target`.
    async fn translate(&self, text: &str, target: &str) -> Result<String, CapabilityError>;
}

/// One web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<WebHit>, CapabilityError>;
}

/// One chunk returned by the document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: f64,
}

/// A searchable knowledge base (hybrid keyword + vector).
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        top: usize,
    ) -> Result<Vec<DocumentHit>, CapabilityError>;
}

/// Read-only structured data lookup.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Run `sql` and return at most `max_rows` rows as JSON objects.
    async fn query(
        &self,
        sql: &str,
        max_rows: usize,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, CapabilityError>;
}
