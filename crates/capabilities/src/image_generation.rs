//! `generate_images` — text-to-image generation delivered as an adaptive card.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::channel::{Attachment, OutgoingMessage, Replier};
use planbot_core::error::CapabilityError;
use planbot_core::service::ImageGenerator;
use serde_json::json;
use tracing::debug;

pub struct ImageGenerationCapability {
    generator: Arc<dyn ImageGenerator>,
    replier: Replier,
}

impl ImageGenerationCapability {
    pub fn new(generator: Arc<dyn ImageGenerator>, replier: Replier) -> Self {
        Self { generator, replier }
    }
}

/// An adaptive card showing the generated images in order.
pub fn image_card(urls: &[String]) -> Attachment {
    let mut body = vec![json!({
        "type": "TextBlock",
        "text": "Here are the generated images.",
        "size": "large",
    })];
    body.extend(urls.iter().map(|url| json!({ "type": "Image", "url": url })));

    Attachment::adaptive_card(json!({
        "type": "AdaptiveCard",
        "version": "1.0",
        "body": body,
    }))
}

#[async_trait]
impl Capability for ImageGenerationCapability {
    fn name(&self) -> &str {
        "generate_images"
    }

    fn description(&self) -> &str {
        "Generate images from descriptions."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required(
                "prompt",
                ParamType::String,
                "The description of the images to be generated",
            ),
            ParamSpec::optional(
                "n",
                ParamType::Integer,
                "The number of images to generate. If not specified, use 1",
            )
            .with_default(json!(1)),
        ]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        let prompt = arguments.require_str("prompt")?;
        let n = arguments.i64("n").filter(|n| *n > 0).unwrap_or(1);

        self.replier
            .notify_text(format!(
                "Generating {n} images with the description \"{prompt}\"..."
            ))
            .await;

        let mut urls = Vec::new();
        for i in 0..n {
            debug!(image = i + 1, of = n, "Generating image");
            urls.push(self.generator.generate(prompt).await?);
        }

        self.replier
            .notify(OutgoingMessage::attachment(image_card(&urls)))
            .await;

        Ok(
            ExecutionResult::ok(format!(
                "{n} images were generated successfully and already sent to user."
            ))
            .with_data(json!(urls)),
        )
    }
}
