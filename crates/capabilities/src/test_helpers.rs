//! Shared test helpers for capability tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use planbot_core::channel::{Channel, ChannelId, ChannelMessage, OutgoingMessage, Replier};
use planbot_core::error::{CapabilityError, ChannelError};
use planbot_core::service::ImageGenerator;
use tokio::sync::mpsc;

/// A channel that records everything sent to it.
pub struct RecordingChannel {
    id: ChannelId,
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId("recording".into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn replier(self: &Arc<Self>) -> Replier {
        Replier::new(self.clone(), "chat-1")
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().filter_map(|m| m.text).collect()
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

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, message: &OutgoingMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

/// Hands out `https://img.test/{n}.png` URLs, or fails every call.
pub struct CountingImageGenerator {
    calls: Mutex<usize>,
    fail: bool,
}

impl CountingImageGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ImageGenerator for CountingImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, CapabilityError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if self.fail {
            return Err(CapabilityError::Backend {
                capability: "generate_images".into(),
                status: Some(500),
                message: "content filter".into(),
            });
        }
        Ok(format!("https://img.test/{}.png", *calls))
    }
}
