//! Error types for the planbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all planbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Planning errors ---
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was caused by the turn being cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Capability(CapabilityError::Cancelled(_)) | Error::Plan(PlanError::Cancelled)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Capability not found: {0}")]
    NotFound(String),

    #[error("Capability already registered: {0}")]
    DuplicateName(String),

    #[error("Invalid capability arguments: {0}")]
    InvalidArguments(String),

    #[error("Capability execution failed: {capability} — {reason}")]
    ExecutionFailed { capability: String, reason: String },

    /// The external service behind a capability failed (non-success status,
    /// transport error, malformed payload).
    #[error("{capability} backend failed{}: {message}", status.map(|s| format!(" (status: {s})")).unwrap_or_default())]
    Backend {
        capability: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Capability cancelled: {0}")]
    Cancelled(String),
}

impl CapabilityError {
    /// Shorthand for a backend failure without an HTTP status.
    pub fn backend(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            capability: capability.into(),
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("Planner output could not be parsed: {0}")]
    Malformed(String),

    #[error("Plan references unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("Planning was cancelled")]
    Cancelled,
}
