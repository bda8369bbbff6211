//! Shared test helpers for dispatcher, planner and executor tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::channel::{Channel, ChannelId, ChannelMessage, OutgoingKind, OutgoingMessage, Replier};
use planbot_core::error::{CapabilityError, ChannelError, ProviderError};
use planbot_core::message::{Message, MessageToolCall};
use planbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use planbot_core::service::{ImageGenerator, Translator};
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Like `new`, but individual calls may fail.
    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let count = requests.len();

        if count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                count,
                responses.len()
            );
        }

        requests.push(request);
        responses[count].clone()
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A channel that records everything sent to it and can replay inbound
/// messages.
pub struct RecordingChannel {
    id: ChannelId,
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
    inbound: Mutex<Vec<ChannelMessage>>,
    live: Mutex<Option<mpsc::Receiver<Result<ChannelMessage, ChannelError>>>>,
}

/// Feeds a live [`RecordingChannel`]; dropping it ends the inbound stream.
pub type InboundFeed = mpsc::Sender<Result<ChannelMessage, ChannelError>>;

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Self::with_inbound(Vec::new())
    }

    /// A channel whose `start` yields `messages` and then closes.
    pub fn with_inbound(messages: Vec<ChannelMessage>) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(messages),
            live: Mutex::new(None),
        })
    }

    /// A channel whose inbound stream stays open until the feed is dropped.
    pub fn live() -> (Arc<Self>, InboundFeed) {
        let (tx, rx) = mpsc::channel(16);
        let channel = Arc::new(Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(Vec::new()),
            live: Mutex::new(Some(rx)),
        });
        (channel, tx)
    }

    pub fn replier(self: &Arc<Self>) -> Replier {
        Replier::new(self.clone(), "chat-1")
    }

    /// Non-typing messages sent to `chat_id`.
    pub fn sent_to(&self, chat_id: &str) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, m)| c == chat_id && m.kind == OutgoingKind::Message)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent_to("chat-1")
    }

    /// Text of every non-typing message to `chat-1`.
    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().filter_map(|m| m.text).collect()
    }

    pub fn typing_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.kind == OutgoingKind::Typing)
            .count()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if let Some(rx) = self.live.lock().unwrap().take() {
            return Ok(rx);
        }
        let messages: Vec<ChannelMessage> = self.inbound.lock().unwrap().drain(..).collect();
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        for msg in messages {
            tx.send(Ok(msg)).await.unwrap();
        }
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((chat_id.to_string(), message.clone()));
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        self.send(chat_id, &OutgoingMessage::typing()).await
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

/// An inbound text message for `chat_id`.
pub fn inbound(chat_id: &str, text: &str) -> ChannelMessage {
    ChannelMessage {
        channel_id: ChannelId("recording".into()),
        sender_id: "user-1".into(),
        sender_name: Some("User".into()),
        content: text.into(),
        chat_id: chat_id.into(),
        attachments: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

/// Translator that answers `[code] text`, failing for chosen codes.
pub struct ScriptedTranslator {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(mut self, code: &str) -> Self {
        self.failing.push(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, CapabilityError> {
        self.calls.lock().unwrap().push(target.to_string());
        if self.failing.iter().any(|c| c == target) {
            return Err(CapabilityError::Backend {
                capability: "translate".into(),
                status: Some(401),
                message: "Translation API call failed".into(),
            });
        }
        Ok(format!("[{target}] {text}"))
    }
}

/// Image generator returning `https://img.test/{n}.png`.
pub struct FakeImageGenerator {
    calls: Mutex<usize>,
}

impl FakeImageGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CapabilityError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(format!("https://img.test/{}.png", *calls))
    }
}

/// Capability echoing its `text` argument, or failing when `fail` is set.
pub struct EchoCapability {
    pub name: &'static str,
}

#[async_trait]
impl Capability for EchoCapability {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Echo the text back"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("text", ParamType::String, "Text to echo"),
            ParamSpec::optional("fail", ParamType::Boolean, "Fail instead")
                .with_default(serde_json::json!(false)),
        ]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        if arguments.bool("fail").unwrap_or(false) {
            return Err(CapabilityError::backend(self.name, "service unavailable"));
        }
        Ok(ExecutionResult::ok(format!("echo: {}", arguments.require_str("text")?)))
    }
}

/// Capability that never completes.
pub struct HangingCapability;

#[async_trait]
impl Capability for HangingCapability {
    fn name(&self) -> &str {
        "hang"
    }

    fn description(&self) -> &str {
        "Never finishes"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn invoke(&self, _arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        std::future::pending().await
    }
}

/// A provider whose completions never return.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}
