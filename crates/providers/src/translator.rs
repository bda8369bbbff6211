//! Machine translation over the Azure Translator v3 REST API.
//!
//! `POST {endpoint}/translate?api-version=3.0&to={code}` with a body of
//! `[{"Text": "..."}]`; the translation is read from
//! `[0].translations[0].text`.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::TranslatorConfig;
use planbot_core::error::CapabilityError;
use planbot_core::service::Translator;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CAPABILITY: &str = "translate";
const DEFAULT_REGION: &str = "eastus2";

pub struct AzureTranslator {
    endpoint: String,
    api_key: String,
    region: String,
    client: reqwest::Client,
}

impl AzureTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let client = crate::http_client();

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            region: region.into(),
            client,
        }
    }

    /// Build a translator from `[translator]`, or `None` when it is not configured.
    pub fn from_config(config: &TranslatorConfig) -> Option<Arc<dyn Translator>> {
        let (Some(endpoint), Some(api_key)) = (&config.endpoint, &config.api_key) else {
            return None;
        };
        let region = config.region.as_deref().unwrap_or(DEFAULT_REGION);
        Some(Arc::new(Self::new(endpoint, api_key, region)))
    }
}

#[async_trait]
impl Translator for AzureTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, CapabilityError> {
        debug!(target_language = %target, "Requesting translation");

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .query(&[("api-version", "3.0"), ("to", target)])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Ocp-Apim-Subscription-Region", &self.region)
            .json(&[TranslateInput { text }])
            .send()
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Backend {
                capability: CAPABILITY.into(),
                status: Some(status.as_u16()),
                message: format!("Translation API call failed: {body}"),
            });
        }

        let body: Vec<TranslateOutput> = response
            .json()
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Failed to parse response: {e}")))?;

        first_translation(body)
            .ok_or_else(|| CapabilityError::backend(CAPABILITY, "Response contained no translation"))
    }
}

fn first_translation(body: Vec<TranslateOutput>) -> Option<String> {
    body.into_iter()
        .next()
        .and_then(|item| item.translations.into_iter().next())
        .map(|t| t.text)
}

#[derive(Serialize)]
struct TranslateInput<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Deserialize)]
struct TranslateOutput {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}
