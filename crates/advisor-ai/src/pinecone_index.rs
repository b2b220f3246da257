use crate::embeddings::EmbeddingClient;
use advisor_core::{AdvisorError, CourseDocument, CourseIndex, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for a Pinecone serverless index.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// Index host, e.g. "https://duckweb-spring24-xxxx.svc.pinecone.io"
    pub host: String,
    pub api_key: String,
    pub namespace: Option<String>,
    pub timeout: Duration,
}

impl PineconeConfig {
    pub fn from_env(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: std::env::var("PINECONE_API_KEY").unwrap_or_default(),
            namespace: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`CourseIndex`] backed by a Pinecone index of course catalog documents.
///
/// Queries are embedded with the OpenAI embeddings endpoint and sent to the
/// index `/query` route with metadata included. Match metadata becomes the
/// document's field map; no field is assumed present.
pub struct PineconeIndex {
    config: PineconeConfig,
    client: Client,
    embedder: EmbeddingClient,
}

impl PineconeIndex {
    pub fn new(config: PineconeConfig, embedder: EmbeddingClient) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AdvisorError::Index(
                "Pinecone API key is required. Set PINECONE_API_KEY environment variable."
                    .to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdvisorError::Index(e.to_string()))?;

        Ok(Self {
            config,
            client,
            embedder,
        })
    }

    fn document_from_match(m: QueryMatch) -> CourseDocument {
        let mut metadata: HashMap<String, String> = HashMap::new();
        for (key, value) in m.metadata.unwrap_or_default() {
            metadata.insert(key, metadata_value_to_string(value));
        }
        if !metadata.contains_key("id") && !m.id.is_empty() {
            metadata.insert("id".to_string(), m.id);
        }

        // Rendered content mirrors the catalog block the models see.
        let content = render_content(&metadata);

        CourseDocument { content, metadata }
    }
}

fn metadata_value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        // Pinecone serves numeric metadata as floats; integer-valued numbers
        // must render without a decimal point so "0" seat counts stay "0".
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        (f as i64).to_string()
                    }
                    _ => n.to_string(),
                }
            }
        }
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn render_content(metadata: &HashMap<String, String>) -> String {
    let get = |key: &str| metadata.get(key).map(|v| v.as_str()).unwrap_or("");
    format!(
        "Course: {}\nName: {}\nCredits: {}\nDescription: {}\nPrerequisites: {}\nInstructor: {}\nSchedule: {} at {}\nLocation: {}\nSeats Available: {}/{}",
        get("course_code"),
        get("course_name"),
        get("credit_hours"),
        get("description"),
        get("prerequisites"),
        get("instructor"),
        get("days"),
        get("time"),
        get("classroom"),
        get("available_seats"),
        get("total_seats"),
    )
}

#[async_trait]
impl CourseIndex for PineconeIndex {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<CourseDocument>> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AdvisorError::Index(format!("query embedding failed: {e}")))?;

        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            namespace: self.config.namespace.clone(),
        };

        let response = self
            .client
            .post(format!("{}/query", self.config.host))
            .header("Api-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::Index(format!("query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdvisorError::Index(format!(
                "index error ({status}): {error_text}"
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Index(format!("malformed query response: {e}")))?;

        debug!(matches = parsed.matches.len(), "semantic search completed");

        Ok(parsed
            .matches
            .into_iter()
            .map(Self::document_from_match)
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
}
