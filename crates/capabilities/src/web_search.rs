//! `search_web` — web search through a Bing-style REST API.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::WebSearchConfig;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::error::CapabilityError;
use planbot_core::service::{WebHit, WebSearchBackend};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const CAPABILITY: &str = "search_web";
const MAX_RESULTS: i64 = 10;

pub struct WebSearchCapability {
    backend: Arc<dyn WebSearchBackend>,
}

impl WebSearchCapability {
    pub fn new(backend: Arc<dyn WebSearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Capability for WebSearchCapability {
    fn name(&self) -> &str {
        CAPABILITY
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information. Returns titles, URLs and snippets."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamType::String, "The search query"),
            ParamSpec::optional(
                "count",
                ParamType::Integer,
                "Number of results to return (default 3, max 10)",
            )
            .with_default(json!(3)),
        ]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        let query = arguments.require_str("query")?;
        let count = arguments.i64("count").unwrap_or(3).clamp(1, MAX_RESULTS) as usize;

        let hits = self.backend.search(query, count).await?;
        debug!(query = %query, hits = hits.len(), "Web search complete");

        if hits.is_empty() {
            return Ok(ExecutionResult::ok(format!("No web results found for '{query}'.")));
        }

        let summary = hits
            .iter()
            .take(count)
            .map(|h| format!("{} — {}: {}", h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ExecutionResult::ok(summary).with_data(json!(hits)))
    }
}

/// Client for the Bing Web Search v7 API.
pub struct BingWebSearch {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl BingWebSearch {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn from_config(config: &WebSearchConfig) -> Option<Arc<dyn WebSearchBackend>> {
        let api_key = config.api_key.as_ref()?;
        Some(Arc::new(Self::new(&config.endpoint, api_key)))
    }
}

#[async_trait]
impl WebSearchBackend for BingWebSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<WebHit>, CapabilityError> {
        let count = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Backend {
                capability: CAPABILITY.into(),
                status: Some(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: BingResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Failed to parse response: {e}")))?;

        Ok(body.into_hits())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    #[serde(default)]
    web_pages: Option<BingWebPages>,
}

#[derive(Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Deserialize)]
struct BingPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

impl BingResponse {
    fn into_hits(self) -> Vec<WebHit> {
        self.web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .map(|page| WebHit {
                title: page.name,
                url: page.url,
                snippet: page.snippet,
            })
            .collect()
    }
}
