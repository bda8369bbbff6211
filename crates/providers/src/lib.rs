//! Model and service clients for planbot.
//!
//! Language models implement `planbot_core::Provider`; the router selects the
//! configured one. Image generation rides on the same OpenAI-compatible
//! endpoint, and translation talks to the Azure Translator API.

use std::time::Duration;

pub mod openai_compat;
pub mod router;
pub mod translator;

pub use openai_compat::{OpenAiCompatProvider, OpenAiImageGenerator};
pub use router::{ProviderRouter, build_from_config};
pub use translator::AzureTranslator;

/// Timeout for every outbound HTTP request made by this crate.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
