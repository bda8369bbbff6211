//! Direct planner: the whole plan from a single completion.
//!
//! The model is shown the capability catalogue and the conversation and
//! answers with a JSON plan. The plan is validated against the turn's
//! registry; a rejected plan is retried once with the error fed back.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::PlannerKind;
use planbot_core::capability::CapabilityRegistry;
use planbot_core::error::{Error, PlanError};
use planbot_core::message::Message;
use planbot_core::provider::{Provider, ProviderRequest};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Plan, PlanStep, Planner, TurnContext, cancellable};

const INSTRUCTIONS: &str = "\
You decide how to respond to the user's latest message in the conversation.
Reply with a single JSON object and nothing else, in this shape:
{\"steps\": [{\"capability\": \"<name>\", \"arguments\": {}, \"expects_result\": true}], \"answer\": \"<final reply>\"}

Rules:
- Use only the capabilities listed below, with their listed parameters.
- Steps run in order. A string argument may contain {{step.N}} (1-based) or {{last}} to use the result of an earlier step.
- Set expects_result to false when the capability already shows its result to the user.
- If no capability is needed, return an empty steps list and put the reply in \"answer\".
- \"answer\" may use the same placeholders. Omit it to reply with the step results.";

const NO_CAPABILITIES: &str = "No capabilities are available. Answer directly.";

/// Plans a turn with one completion.
pub struct DirectPlanner {
    provider: Arc<dyn Provider>,
    model: String,
    system_message: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    steps: Vec<PlanStep>,
    #[serde(default)]
    answer: Option<String>,
}

impl DirectPlanner {
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
            max_tokens: 4096,
        }
    }

    fn planning_prompt(&self, registry: &CapabilityRegistry) -> String {
        format!(
            "{}\n\n{INSTRUCTIONS}\n\nAvailable capabilities:\n{}",
            self.system_message,
            catalogue(registry)
        )
    }
}

#[async_trait]
impl Planner for DirectPlanner {
    fn kind(&self) -> PlannerKind {
        PlannerKind::Direct
    }

    async fn plan(&self, turn: &TurnContext<'_>) -> Result<Plan, Error> {
        let mut messages = vec![
            Message::system(self.planning_prompt(turn.registry)),
            Message::user(format!("Conversation:\n{}", turn.history)),
        ];

        info!(model = %self.model, capabilities = turn.registry.len(), "Direct planning");

        let mut retried = false;
        loop {
            let mut request = ProviderRequest::new(&self.model, messages.clone());
            request.temperature = self.temperature;
            request.max_tokens = Some(self.max_tokens);

            let response = cancellable(turn.cancel, self.provider.complete(request)).await??;
            let content = response.message.content;

            match parse_plan(&content, turn.registry) {
                Ok(plan) => {
                    debug!(plan = ?plan, "Plan accepted");
                    return Ok(plan);
                }
                Err(e) if !retried => {
                    warn!(error = %e, "Plan rejected, retrying");
                    retried = true;
                    messages.push(Message::assistant(content));
                    messages.push(Message::user(format!(
                        "That plan was rejected: {e}. Reply with a corrected JSON object only."
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// The capability catalogue shown to the model.
fn catalogue(registry: &CapabilityRegistry) -> String {
    if registry.is_empty() {
        return NO_CAPABILITIES.to_string();
    }
    registry
        .definitions()
        .iter()
        .map(|d| format!("- {}: {}\n  parameters: {}", d.name, d.description, d.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The JSON object in a model reply, tolerating markdown fences and
/// surrounding prose.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}

/// Parse and validate a plan against the registry.
fn parse_plan(content: &str, registry: &CapabilityRegistry) -> Result<Plan, PlanError> {
    let json = extract_json(content)
        .ok_or_else(|| PlanError::Malformed("no JSON object in planner reply".into()))?;
    let raw: RawPlan =
        serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))?;

    for (i, step) in raw.steps.iter().enumerate() {
        if !registry.contains(&step.capability) {
            return Err(PlanError::UnknownCapability(step.capability.clone()));
        }
        if !(step.arguments.is_object() || step.arguments.is_null()) {
            return Err(PlanError::Malformed(format!(
                "arguments of step {} must be an object",
                i + 1
            )));
        }
    }

    let answer = raw.answer.filter(|a| !a.trim().is_empty());
    match (raw.steps.is_empty(), answer) {
        (true, Some(answer)) => Ok(Plan::Answer(answer)),
        (true, None) => Err(PlanError::Malformed(
            "plan has neither steps nor an answer".into(),
        )),
        (false, answer_template) => Ok(Plan::Steps {
            steps: raw.steps,
            answer_template,
        }),
    }
}
