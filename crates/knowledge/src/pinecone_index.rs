//! Pinecone vector index backend.
//!
//! Talks to the data-plane REST API of a single index host:
//! `POST {host}/query` and `POST {host}/describe_index_stats`.

use std::time::Duration;

use crate::types::Passage;
use crate::vector_index::{IndexStats, VectorIndex};
use reqwest::Client;
use sage_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

/// Connection settings for a Pinecone index.
#[derive(Debug, Clone)]
pub struct PineconeSettings {
    pub host: String,
    pub api_key: String,
    pub namespace: Option<String>,
    /// Metadata field holding the passage text
    pub text_field: String,
    /// Metadata field holding the source video identifier
    pub source_field: String,
    pub timeout: Duration,
}

pub struct PineconeIndex {
    client: Client,
    settings: PineconeSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
}

impl PineconeIndex {
    pub fn new(mut settings: PineconeSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                AppError::Retrieval(format!("Failed to create HTTP client for Pinecone: {}", e))
            })?;

        let host = settings.host.trim_end_matches('/').to_string();
        settings.host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        Ok(Self { client, settings })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<R> {
        let url = format!("{}{}", self.settings.host, path);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach Pinecone: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Pinecone API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse Pinecone response: {}", e)))
    }

    /// Convert a match into a passage, skipping matches without text.
    fn to_passage(&self, m: QueryMatch) -> Option<Passage> {
        let metadata = m.metadata.unwrap_or_default();
        let text = metadata
            .get(&self.settings.text_field)
            .and_then(Value::as_str)?
            .to_string();
        let source = metadata
            .get(&self.settings.source_field)
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        Some(Passage {
            id: m.id,
            text,
            source,
            score: m.score,
        })
    }
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<Passage>> {
        let request = QueryRequest {
            vector: query_embedding,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.settings.namespace.as_deref(),
        };

        let response: QueryResponse = self.post("/query", &request).await?;
        let total = response.matches.len();

        let mut passages: Vec<Passage> = response
            .matches
            .into_iter()
            .filter_map(|m| self.to_passage(m))
            .collect();

        if passages.len() < total {
            tracing::warn!(
                "Dropped {} Pinecone matches without '{}' metadata",
                total - passages.len(),
                self.settings.text_field
            );
        }

        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(top_k);
        Ok(passages)
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let response: StatsResponse = self
            .post("/describe_index_stats", &serde_json::json!({}))
            .await?;
        Ok(IndexStats {
            vector_count: response.total_vector_count,
        })
    }
}
