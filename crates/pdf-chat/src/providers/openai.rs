//! OpenAI API client for embeddings and chat completions with retry logic

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, OpenAiConfig};
use crate::error::{Error, Result};
use crate::types::ChatMessage;

use super::embedding::EmbeddingProvider;
use super::llm::ChatModel;
use super::retry::retry_request;

/// OpenAI API client with automatic retry
pub struct OpenAiClient {
    /// HTTP client with auth headers preset
    client: Client,
    /// Configuration
    config: OpenAiConfig,
    /// Texts per embedding request
    batch_size: usize,
    /// Embedding requests in flight at once
    concurrent_batches: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(config: &OpenAiConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".into()))?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| Error::Config("OPENAI_API_KEY contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        if let Some(org) = &config.organization {
            let value = header::HeaderValue::from_str(org)
                .map_err(|_| Error::Config("Invalid OpenAI organization".into()))?;
            headers.insert("OpenAI-Organization", value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            batch_size: embeddings.batch_size.max(1),
            concurrent_batches: embeddings.concurrent_batches.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Embed one request-sized batch
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.url("embeddings");
        let url = url.as_str();

        retry_request(self.config.max_retries, move || async move {
            let request = EmbeddingRequest {
                model: &self.config.embedding_model,
                input: batch,
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(api_error(status, &body, Error::Embedding));
            }

            let mut parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

            if parsed.data.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    parsed.data.len()
                )));
            }

            parsed.data.sort_by_key(|d| d.index);
            Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
        })
        .await
    }
}

/// Map a non-success response to an error; auth and model problems are configuration errors
fn api_error(status: StatusCode, body: &str, wrap: fn(String) -> Error) -> Error {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            Error::Config(format!("OpenAI rejected the request (HTTP {}): {}", status, message))
        }
        _ => wrap(format!("HTTP {} - {}", status, message)),
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Embedding {} texts with {} in batches of {}",
            texts.len(),
            self.config.embedding_model,
            self.batch_size
        );

        let requests: Vec<_> = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch(batch))
            .collect();

        let batches: Vec<Vec<Vec<f32>>> = futures::stream::iter(requests)
            .buffered(self.concurrent_batches)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("models")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.url("chat/completions");
        let url = url.as_str();

        tracing::info!("Generating answer with model: {}", self.config.chat_model);

        retry_request(self.config.max_retries, move || async move {
            let request = ChatCompletionRequest {
                model: &self.config.chat_model,
                messages,
                temperature: self.config.temperature,
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::llm(format!("Chat request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(api_error(status, &body, Error::Llm));
            }

            let parsed: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| Error::llm("Chat response contained no message"))
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn embeddings(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"message": "Incorrect API key provided"}})),
            );
        }

        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        // Reverse order to check that results are re-sorted by index
        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(i, text)| {
                let len = text.as_str().unwrap_or("").len() as f32;
                json!({"object": "embedding", "index": i, "embedding": [len, 1.0]})
            })
            .collect();

        (StatusCode::OK, Json(json!({"object": "list", "data": data})))
    }

    async fn chat(Json(body): Json<Value>) -> Json<Value> {
        let last = body["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m["content"].as_str())
            .unwrap_or("")
            .to_string();

        Json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": format!("echo: {}", last)},
                "finish_reason": "stop"
            }]
        }))
    }

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route("/v1/embeddings", post(embeddings))
            .route("/v1/chat/completions", post(chat));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/v1", addr)
    }

    fn client(base_url: String, api_key: &str, batch_size: usize) -> OpenAiClient {
        let config = OpenAiConfig {
            api_key: Some(api_key.to_string()),
            base_url,
            max_retries: 0,
            ..OpenAiConfig::default()
        };
        let embeddings = EmbeddingConfig {
            batch_size,
            concurrent_batches: 2,
        };
        OpenAiClient::new(&config, &embeddings).unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiClient::new(&OpenAiConfig::default(), &EmbeddingConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_embed_documents_batches_in_order() {
        let client = client(spawn_mock().await, "sk-test", 2);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let embeddings = client.embed_documents(&texts).await.unwrap();

        let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_embed_documents_on_spawned_task() {
        let provider: std::sync::Arc<dyn EmbeddingProvider> =
            std::sync::Arc::new(client(spawn_mock().await, "sk-test", 1));
        let texts = vec!["one".to_string(), "three".to_string(), "xy".to_string()];

        let embeddings = tokio::spawn(async move { provider.embed_documents(&texts).await })
            .await
            .unwrap()
            .unwrap();

        let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, vec![3.0, 5.0, 2.0]);
    }

    #[tokio::test]
    async fn test_embed_query() {
        let client = client(spawn_mock().await, "sk-test", 16);
        let embedding = client.embed_query("hello").await.unwrap();
        assert_eq!(embedding, vec![5.0, 1.0]);
    }

    #[tokio::test]
    async fn test_bad_key_is_config_error() {
        let client = client(spawn_mock().await, "sk-wrong", 16);
        let err = client.embed_query("hello").await.unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("Incorrect API key")));
    }

    #[tokio::test]
    async fn test_complete() {
        let client = client(spawn_mock().await, "sk-test", 16);
        let answer = client
            .complete(&[ChatMessage::system("be brief"), ChatMessage::user("ping")])
            .await
            .unwrap();
        assert_eq!(answer, "echo: ping");
    }
}
