//! Stepwise planner: reason, call a capability, observe, repeat.
//!
//! Each iteration sends the conversation, every prior call and its result,
//! and the capability definitions plus a built-in `final_answer` function.
//! The loop ends when the model calls `final_answer` or replies with text
//! only.
//!
//! # Budget
//!
//! Tokens are accumulated from provider usage, or estimated from message
//! text when a provider does not report usage. When the total reaches the
//! budget, or the iteration cap is hit, one tool-less completion asks for a
//! best-effort answer. If even that fails the planner answers with a fixed
//! sentence carrying the last observation. Exhaustion is never an error.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::PlannerKind;
use planbot_core::capability::CapabilityCall;
use planbot_core::error::{CapabilityError, Error, PlanError};
use planbot_core::message::{Message, MessageToolCall};
use planbot_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{Plan, Planner, TurnContext, cancellable};
use crate::history::estimate_tokens;

/// Name of the built-in function that ends the loop.
pub const FINAL_ANSWER: &str = "final_answer";

const INSTRUCTIONS: &str = "\
Work out how to respond to the user's latest message in the conversation. \
Call the available functions when they help, one step at a time, and look at each result before deciding the next step. \
When you are done, call final_answer with the reply for the user.";

const EXHAUSTED: &str =
    "You are out of budget for this request. Give your best final answer now, using only what you already know.";

/// Plans a turn by interleaving reasoning with capability calls.
pub struct StepwisePlanner {
    provider: Arc<dyn Provider>,
    model: String,
    system_message: String,
    temperature: f32,
    /// Token budget for one planning run.
    max_tokens: u32,
    max_iterations: u32,
}

impl StepwisePlanner {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_message: system_message.into(),
            temperature: 0.3,
            max_tokens: 128_000,
            max_iterations: 10,
        }
    }

    /// Set the token budget.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run one capability call and describe the outcome for the model.
    ///
    /// Failures are reported to the user and fed back as `Error: ...`;
    /// only cancellation stops the loop.
    async fn observe(&self, tc: &MessageToolCall, turn: &TurnContext<'_>) -> Result<String, Error> {
        let arguments = if tc.arguments.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&tc.arguments) {
                Ok(v) => v,
                Err(e) => return Ok(format!("Error: arguments are not valid JSON: {e}")),
            }
        };

        let call = CapabilityCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        };

        match turn.registry.invoke(&call, turn.cancel).await {
            Ok(result) => {
                debug!(capability = %tc.name, success = result.success, "Capability observed");
                Ok(result.summary)
            }
            Err(CapabilityError::Cancelled(_)) => Err(PlanError::Cancelled.into()),
            Err(e) => {
                warn!(capability = %tc.name, error = %e, "Capability failed");
                turn.replier
                    .notify_text(format!("{} failed: {e}", tc.name))
                    .await;
                Ok(format!("Error: {e}"))
            }
        }
    }

    /// Ask for an answer without tools once the budget is spent.
    async fn best_effort(
        &self,
        mut messages: Vec<Message>,
        last_observation: Option<String>,
        turn: &TurnContext<'_>,
    ) -> Result<String, Error> {
        messages.push(Message::user(EXHAUSTED));
        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = self.temperature;

        match cancellable(turn.cancel, self.provider.complete(request)).await? {
            Ok(response) if !response.message.content.trim().is_empty() => {
                Ok(response.message.content.trim().to_string())
            }
            Ok(_) => Ok(fallback(last_observation.as_deref())),
            Err(e) => {
                warn!(error = %e, "Best-effort completion failed");
                Ok(fallback(last_observation.as_deref()))
            }
        }
    }
}

#[async_trait]
impl Planner for StepwisePlanner {
    fn kind(&self) -> PlannerKind {
        PlannerKind::Stepwise
    }

    async fn plan(&self, turn: &TurnContext<'_>) -> Result<Plan, Error> {
        let mut tools = turn.registry.definitions();
        tools.push(final_answer_definition());

        let mut messages = vec![
            Message::system(format!("{}\n\n{INSTRUCTIONS}", self.system_message)),
            Message::user(format!("Conversation:\n{}", turn.history)),
        ];
        let mut tokens_used = 0usize;
        let mut iterations = 0u32;
        let mut tool_calls_made = 0usize;
        let mut last_observation: Option<String> = None;

        info!(model = %self.model, max_iter = self.max_iterations, budget = self.max_tokens, "Stepwise planning");

        while iterations < self.max_iterations && tokens_used < self.max_tokens as usize {
            iterations += 1;
            debug!(iteration = iterations, tokens_used, "Stepwise iteration");

            let mut request = ProviderRequest::new(&self.model, messages.clone());
            request.temperature = self.temperature;
            request.tools = tools.clone();

            let response = cancellable(turn.cancel, self.provider.complete(request)).await??;
            tokens_used += tokens_for(&response, &messages);
            let message = response.message;

            // ── Text-only reply is the answer ──
            if message.tool_calls.is_empty() {
                let answer = message.content.trim();
                info!(iterations, tool_calls = tool_calls_made, "Stepwise planning completed");
                return Ok(Plan::Answer(if answer.is_empty() {
                    fallback(last_observation.as_deref())
                } else {
                    answer.to_string()
                }));
            }

            // ── Execute calls in order ──
            let tool_calls = message.tool_calls.clone();
            messages.push(message);

            for tc in &tool_calls {
                if tc.name == FINAL_ANSWER {
                    match final_answer_text(tc) {
                        Some(answer) => {
                            info!(iterations, tool_calls = tool_calls_made, "Stepwise planning completed");
                            return Ok(Plan::Answer(answer));
                        }
                        None => {
                            messages.push(Message::tool_result(
                                &tc.id,
                                "Error: final_answer requires a non-empty 'answer' string",
                            ));
                            continue;
                        }
                    }
                }

                tool_calls_made += 1;
                let observation = self.observe(tc, turn).await?;
                last_observation = Some(observation.clone());
                messages.push(Message::tool_result(&tc.id, observation));
            }
        }

        warn!(iterations, tokens_used, "Stepwise planner exhausted its budget");
        let answer = self.best_effort(messages, last_observation, turn).await?;
        Ok(Plan::Answer(answer))
    }
}

fn final_answer_definition() -> ToolDefinition {
    ToolDefinition {
        name: FINAL_ANSWER.into(),
        description: "Give the final reply to the user and stop.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string", "description": "The reply for the user"}
            },
            "required": ["answer"]
        }),
    }
}

fn final_answer_text(tc: &MessageToolCall) -> Option<String> {
    let args: Value = serde_json::from_str(&tc.arguments).ok()?;
    let answer = args.get("answer")?.as_str()?.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

/// Tokens charged for one iteration.
fn tokens_for(response: &ProviderResponse, sent: &[Message]) -> usize {
    match &response.usage {
        Some(usage) => usage.total_tokens as usize,
        None => {
            sent.iter().map(|m| estimate_tokens(&m.content)).sum::<usize>()
                + estimate_tokens(&response.message.content)
        }
    }
}

fn fallback(last_observation: Option<&str>) -> String {
    match last_observation {
        Some(obs) => format!(
            "I could not finish working on this request. The last thing I found was: {obs}"
        ),
        None => "I could not finish working on this request.".to_string(),
    }
}
