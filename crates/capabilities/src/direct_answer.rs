//! `answer_directly` — reply to the user from the conversation alone.
//!
//! Offered to the direct planner so a plan can end in a conversational
//! answer without any external service.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::error::CapabilityError;
use planbot_core::message::Message;
use planbot_core::provider::{Provider, ProviderRequest};

const CAPABILITY: &str = "answer_directly";

pub struct DirectAnswerCapability {
    provider: Arc<dyn Provider>,
    model: String,
    system_message: String,
    history: String,
}

impl DirectAnswerCapability {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_message: impl Into<String>,
        history: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_message: system_message.into(),
            history: history.into(),
        }
    }
}

#[async_trait]
impl Capability for DirectAnswerCapability {
    fn name(&self) -> &str {
        CAPABILITY
    }

    fn description(&self) -> &str {
        "Reply to the user directly, without any other capability. Use for greetings, follow-ups and questions answerable from the conversation."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "message",
            ParamType::String,
            "The question or remark to respond to",
        )]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        let message = arguments.require_str("message")?;

        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(&self.system_message),
                Message::user(format!(
                    "Conversation so far:\n{}\n\nRespond to the user about: {message}",
                    self.history
                )),
            ],
        );

        let response = self.provider.complete(request).await.map_err(|e| {
            CapabilityError::ExecutionFailed {
                capability: CAPABILITY.into(),
                reason: e.to_string(),
            }
        })?;

        Ok(ExecutionResult::ok(response.message.content.trim()))
    }
}
