//! Planning strategies.
//!
//! A planner turns the conversation into a [`Plan`] over the capabilities
//! registered for the turn. Two strategies are available, chosen once at
//! startup:
//!
//! - [`DirectPlanner`] — one completion produces the whole plan as JSON
//! - [`StepwisePlanner`] — a function-calling loop that invokes
//!   capabilities while it reasons and ends with a final answer

pub mod direct;
pub mod stepwise;

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::{AppConfig, PlannerKind};
use planbot_core::capability::CapabilityRegistry;
use planbot_core::channel::Replier;
use planbot_core::error::{Error, PlanError};
use planbot_core::provider::Provider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use direct::DirectPlanner;
pub use stepwise::StepwisePlanner;

/// One capability invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub capability: String,

    #[serde(default)]
    pub arguments: Value,

    /// Whether the step's summary belongs in the final reply.
    #[serde(default = "default_expects_result")]
    pub expects_result: bool,
}

fn default_expects_result() -> bool {
    true
}

impl PlanStep {
    /// A step whose result goes into the reply.
    pub fn new(capability: impl Into<String>, arguments: Value) -> Self {
        Self {
            capability: capability.into(),
            arguments,
            expects_result: true,
        }
    }

    /// Mark the step as already showing its result to the user.
    pub fn silent(mut self) -> Self {
        self.expects_result = false;
        self
    }
}

/// What to do for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Reply with this text; nothing to execute.
    Answer(String),

    Steps {
        steps: Vec<PlanStep>,
        /// Final reply, with `{{step.N}}` / `{{last}}` placeholders.
        answer_template: Option<String>,
    },
}

/// Everything a planner sees of the current turn.
pub struct TurnContext<'a> {
    /// Serialized conversation history, latest user message last.
    pub history: &'a str,
    pub registry: &'a CapabilityRegistry,
    pub replier: &'a Replier,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait Planner: Send + Sync {
    fn kind(&self) -> PlannerKind;

    /// Produce the plan for this turn. Provider failures surface as
    /// [`Error::Provider`], bad planner output as [`Error::Plan`].
    async fn plan(&self, turn: &TurnContext<'_>) -> Result<Plan, Error>;
}

/// Build the configured planner.
pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Arc<dyn Planner> {
    match config.bot.planner {
        PlannerKind::Direct => Arc::new(DirectPlanner::new(
            provider,
            &config.chat_model,
            &config.bot.system_message,
        )),
        PlannerKind::Stepwise => Arc::new(
            StepwisePlanner::new(provider, &config.chat_model, &config.bot.system_message)
                .with_max_tokens(config.bot.planner_max_tokens)
                .with_max_iterations(config.bot.max_iterations),
        ),
    }
}

/// Race `fut` against the turn's cancellation token.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, PlanError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PlanError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;

    #[test]
    fn configured_strategy_is_selected() {
        let provider: Arc<dyn Provider> = Arc::new(SequentialMockProvider::new(vec![]));
        let mut config = AppConfig::default();
        assert_eq!(from_config(&config, provider.clone()).kind(), PlannerKind::Direct);

        config.bot.planner = PlannerKind::Stepwise;
        assert_eq!(from_config(&config, provider).kind(), PlannerKind::Stepwise);
    }

    #[test]
    fn step_defaults_expect_a_result() {
        let step: PlanStep = serde_json::from_str(r#"{"capability":"search_web"}"#).unwrap();
        assert!(step.expects_result);
        assert!(step.arguments.is_null());
    }
}
