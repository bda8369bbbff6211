//! `search_documents` — retrieval over the document knowledge base.
//!
//! The query is embedded through the embedding provider and sent to the
//! search index as a hybrid (keyword + vector) query with semantic ranking.
//! Matching titles are shown to the user as sources; the chunks go back to
//! the planner.

use std::sync::Arc;

use async_trait::async_trait;
use planbot_config::SearchConfig;
use planbot_core::capability::{BoundArguments, Capability, ExecutionResult, ParamSpec, ParamType};
use planbot_core::channel::Replier;
use planbot_core::error::CapabilityError;
use planbot_core::provider::{EmbeddingRequest, Provider};
use planbot_core::service::{DocumentHit, DocumentIndex};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const CAPABILITY: &str = "search_documents";
const MAX_TOP: i64 = 10;
const API_VERSION: &str = "2023-11-01";

pub struct DocumentSearchCapability {
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<dyn Provider>,
    embedding_model: String,
    replier: Replier,
}

impl DocumentSearchCapability {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
        replier: Replier,
    ) -> Self {
        Self {
            index,
            embedder,
            embedding_model: embedding_model.into(),
            replier,
        }
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>, CapabilityError> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Embedding failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::backend(CAPABILITY, "Embedding response was empty"))
    }
}

#[async_trait]
impl Capability for DocumentSearchCapability {
    fn name(&self) -> &str {
        CAPABILITY
    }

    fn description(&self) -> &str {
        "Search the company document knowledge base (policies, handbooks, manuals) and return the most relevant passages."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamType::String, "What to look for"),
            ParamSpec::optional(
                "top",
                ParamType::Integer,
                "Number of passages to return (default 3)",
            )
            .with_default(json!(3)),
        ]
    }

    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
        let query = arguments.require_str("query")?;
        let top = arguments.i64("top").unwrap_or(3).clamp(1, MAX_TOP) as usize;

        let vector = self.embed(query).await?;
        let hits = self.index.search(query, &vector, top).await?;
        debug!(query = %query, hits = hits.len(), "Document search complete");

        if hits.is_empty() {
            return Ok(ExecutionResult::ok(format!(
                "No documents matched '{query}'."
            )));
        }

        let sources = hits
            .iter()
            .map(|h| match &h.url {
                Some(url) => format!("- {} ({url})", h.title),
                None => format!("- {}", h.title),
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.replier.notify_text(format!("Sources:\n{sources}")).await;

        let summary = hits
            .iter()
            .map(|h| format!("[{}] {}", h.title, h.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ExecutionResult::ok(summary).with_data(json!(hits)))
    }
}

/// Client for an Azure AI Search index.
pub struct AzureSearchIndex {
    endpoint: String,
    index: String,
    api_key: String,
    semantic_config: Option<String>,
    client: reqwest::Client,
}

impl AzureSearchIndex {
    pub fn new(
        endpoint: impl Into<String>,
        index: impl Into<String>,
        api_key: impl Into<String>,
        semantic_config: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index: index.into(),
            api_key: api_key.into(),
            semantic_config,
            client,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Option<Arc<dyn DocumentIndex>> {
        let (Some(endpoint), Some(index)) = (&config.endpoint, &config.index) else {
            return None;
        };
        Some(Arc::new(Self::new(
            endpoint,
            index,
            config.api_key.clone().unwrap_or_default(),
            config.semantic_config.clone(),
        )))
    }

    fn request_body(&self, query: &str, vector: &[f32], top: usize) -> serde_json::Value {
        let mut body = json!({
            "search": query,
            "top": top,
            "select": "title,content,url",
            "vectorQueries": [{
                "kind": "vector",
                "vector": vector,
                "fields": "contentVector",
                "k": top,
            }],
        });
        if let Some(config) = &self.semantic_config {
            body["queryType"] = json!("semantic");
            body["semanticConfiguration"] = json!(config);
        }
        body
    }
}

#[async_trait]
impl DocumentIndex for AzureSearchIndex {
    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        top: usize,
    ) -> Result<Vec<DocumentHit>, CapabilityError> {
        let url = format!(
            "{}/indexes/{}/docs/search?api-version={API_VERSION}",
            self.endpoint, self.index
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&self.request_body(query, vector, top))
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

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::backend(CAPABILITY, format!("Failed to parse response: {e}")))?;

        Ok(body.into_hits())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchDocument>,
}

#[derive(Deserialize)]
struct SearchDocument {
    #[serde(rename = "@search.score", default)]
    score: f64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<DocumentHit> {
        self.value
            .into_iter()
            .map(|d| DocumentHit {
                title: d.title.unwrap_or_else(|| "Untitled".into()),
                content: d.content,
                url: d.url,
                score: d.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingChannel;
    use planbot_core::capability::bind;
    use planbot_core::error::ProviderError;
    use planbot_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl Provider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("completion".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| vec![0.5, 0.25]).collect(),
                model: request.model,
            })
        }
    }

    struct FakeIndex {
        hits: Vec<DocumentHit>,
        seen: Mutex<Option<(String, Vec<f32>, usize)>>,
    }

    #[async_trait]
    impl DocumentIndex for FakeIndex {
        async fn search(
            &self,
            query: &str,
            vector: &[f32],
            top: usize,
        ) -> Result<Vec<DocumentHit>, CapabilityError> {
            *self.seen.lock().unwrap() = Some((query.to_string(), vector.to_vec(), top));
            Ok(self.hits.iter().take(top).cloned().collect())
        }
    }

    fn handbook() -> Arc<FakeIndex> {
        Arc::new(FakeIndex {
            hits: vec![
                DocumentHit {
                    title: "Leave policy".into(),
                    content: "Employees get 25 days of leave.".into(),
                    url: Some("https://docs/leave".into()),
                    score: 2.1,
                },
                DocumentHit {
                    title: "Travel".into(),
                    content: "Book economy class.".into(),
                    url: None,
                    score: 1.3,
                },
            ],
            seen: Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn embeds_query_and_reports_sources() {
        let channel = RecordingChannel::new();
        let index = handbook();
        let cap = DocumentSearchCapability::new(
            index.clone(),
            Arc::new(FixedEmbedder),
            "text-embedding-3-small",
            channel.replier(),
        );

        let args = bind(&cap.parameters(), &json!({"query": "how much leave"})).unwrap();
        let result = cap.invoke(args).await.unwrap();

        let (query, vector, top) = index.seen.lock().unwrap().clone().unwrap();
        assert_eq!(query, "how much leave");
        assert_eq!(vector, vec![0.5, 0.25]);
        assert_eq!(top, 3);

        assert_eq!(
            channel.texts(),
            ["Sources:\n- Leave policy (https://docs/leave)\n- Travel"]
        );
        assert!(result.summary.starts_with("[Leave policy] Employees get 25 days"));
    }

    #[tokio::test]
    async fn no_hits_sends_nothing() {
        let channel = RecordingChannel::new();
        let index = Arc::new(FakeIndex {
            hits: vec![],
            seen: Mutex::new(None),
        });
        let cap = DocumentSearchCapability::new(index, Arc::new(FixedEmbedder), "e", channel.replier());

        let args = bind(&cap.parameters(), &json!({"query": "nothing"})).unwrap();
        let result = cap.invoke(args).await.unwrap();
        assert_eq!(result.summary, "No documents matched 'nothing'.");
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn request_uses_semantic_config_when_set() {
        let index = AzureSearchIndex::new("https://s.example/", "hr", "k", Some("default".into()));
        let body = index.request_body("leave", &[0.1], 3);
        assert_eq!(body["queryType"], "semantic");
        assert_eq!(body["semanticConfiguration"], "default");
        assert_eq!(body["vectorQueries"][0]["k"], 3);

        let plain = AzureSearchIndex::new("https://s.example", "hr", "k", None);
        assert!(plain.request_body("leave", &[0.1], 3).get("queryType").is_none());
    }

    #[test]
    fn parses_search_payload() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"value": [{"@search.score": 0.8, "title": "Leave", "content": "25 days"},
                          {"@search.score": 0.2, "content": "orphan"}]}"#,
        )
        .unwrap();
        let hits = body.into_hits();
        assert_eq!(hits[0].title, "Leave");
        assert_eq!(hits[1].title, "Untitled");
        assert!((hits[0].score - 0.8).abs() < f64::EPSILON);
    }
}
