//! Per-turn capability wiring.
//!
//! The registry is rebuilt for every turn because handlers are bound to the
//! turn's reply channel and conversation history. A capability whose backing
//! service is not configured is simply left out.

use std::sync::Arc;

use planbot_config::PlannerKind;
use planbot_core::capability::CapabilityRegistry;
use planbot_core::channel::Replier;
use planbot_core::error::CapabilityError;
use planbot_core::provider::Provider;
use planbot_core::service::{DocumentIndex, ImageGenerator, SqlBackend, WebSearchBackend};
use tracing::debug;

use crate::direct_answer::DirectAnswerCapability;
use crate::document_search::DocumentSearchCapability;
use crate::image_generation::ImageGenerationCapability;
use crate::sql_query::SqlQueryCapability;
use crate::web_search::WebSearchCapability;

/// The external services available to this deployment.
#[derive(Clone)]
pub struct CapabilityServices {
    /// Chat model used by `answer_directly`
    pub provider: Arc<dyn Provider>,
    pub chat_model: String,
    pub system_message: String,

    pub images: Arc<dyn ImageGenerator>,
    pub sql: Option<Arc<dyn SqlBackend>>,
    pub documents: Option<Arc<dyn DocumentIndex>>,
    /// Provider used to embed document queries
    pub embedder: Option<Arc<dyn Provider>>,
    pub embedding_model: String,
    pub web: Option<Arc<dyn WebSearchBackend>>,
}

/// What a registry is being built for.
pub struct TurnScope<'a> {
    pub replier: &'a Replier,
    /// Serialized conversation history
    pub history: &'a str,
    pub strategy: PlannerKind,
}

/// Build the registry for one turn.
pub fn build(
    services: &CapabilityServices,
    turn: &TurnScope<'_>,
) -> Result<CapabilityRegistry, CapabilityError> {
    let mut registry = CapabilityRegistry::new();

    registry.register(Arc::new(ImageGenerationCapability::new(
        services.images.clone(),
        turn.replier.clone(),
    )))?;

    if let Some(sql) = &services.sql {
        registry.register(Arc::new(SqlQueryCapability::new(sql.clone())))?;
    }

    if let (Some(index), Some(embedder)) = (&services.documents, &services.embedder) {
        registry.register(Arc::new(DocumentSearchCapability::new(
            index.clone(),
            embedder.clone(),
            &services.embedding_model,
            turn.replier.clone(),
        )))?;
    }

    if let Some(web) = &services.web {
        registry.register(Arc::new(WebSearchCapability::new(web.clone())))?;
    }

    if turn.strategy == PlannerKind::Direct {
        registry.register(Arc::new(DirectAnswerCapability::new(
            services.provider.clone(),
            &services.chat_model,
            &services.system_message,
            turn.history,
        )))?;
    }

    debug!(capabilities = ?registry.names(), "Capability registry built");
    Ok(registry)
}
