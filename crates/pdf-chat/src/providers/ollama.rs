//! Ollama client for local embeddings and chat with retry logic

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, OllamaConfig};
use crate::error::{Error, Result};
use crate::types::ChatMessage;

use super::embedding::EmbeddingProvider;
use super::llm::ChatModel;
use super::retry::retry_request;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OllamaConfig,
    /// Embedding requests in flight at once
    concurrent_requests: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &OllamaConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            concurrent_requests: embeddings.concurrent_batches.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.url("api/embeddings");
        let url = url.as_str();

        retry_request(self.config.max_retries, move || async move {
            let request = EmbedRequest {
                model: &self.config.embedding_model,
                prompt: text,
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::Config(format!(
                    "Ollama model '{}' not found (run: ollama pull {})",
                    self.config.embedding_model, self.config.embedding_model
                )));
            }
            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "Embedding failed: HTTP {}",
                    response.status()
                )));
            }

            let embed_response: EmbedResponse = response
                .json()
                .await
                .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

            Ok(embed_response.embedding)
        })
        .await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama embeds one prompt per request
        let requests: Vec<_> = texts.iter().map(|text| self.embed(text)).collect();

        futures::stream::iter(requests)
            .buffered(self.concurrent_requests)
            .try_collect()
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("api/tags")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.url("api/chat");
        let url = url.as_str();

        tracing::info!("Generating answer with model: {}", self.config.chat_model);

        retry_request(self.config.max_retries, move || async move {
            let request = ChatRequest {
                model: &self.config.chat_model,
                messages,
                stream: false,
                options: ChatOptions {
                    temperature: self.config.temperature,
                },
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::llm(format!(
                    "Generation failed: HTTP {} - {}",
                    status, body
                )));
            }

            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

            Ok(chat_response.message.content)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route(
                "/api/embeddings",
                post(|Json(body): Json<Value>| async move {
                    let len = body["prompt"].as_str().unwrap_or("").len() as f32;
                    Json(json!({ "embedding": [len, 0.5] }))
                }),
            )
            .route(
                "/api/chat",
                post(|Json(body): Json<Value>| async move {
                    let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
                    Json(json!({
                        "model": "llama3.2",
                        "message": {"role": "assistant", "content": format!("{} messages", count)},
                        "done": true
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn client(base_url: String) -> OllamaClient {
        let config = OllamaConfig {
            base_url,
            max_retries: 0,
            ..OllamaConfig::default()
        };
        OllamaClient::new(&config, &EmbeddingConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_embed_documents_preserves_order() {
        let client = client(spawn_mock().await);
        let texts = vec!["x".to_string(), "yyy".to_string(), "zz".to_string()];
        let embeddings = client.embed_documents(&texts).await.unwrap();
        let lengths: Vec<f32> = embeddings.iter().map(|e| e[0]).collect();
        assert_eq!(lengths, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_embed_documents_on_spawned_task() {
        let provider: std::sync::Arc<dyn EmbeddingProvider> = std::sync::Arc::new(client(spawn_mock().await));
        let texts = vec!["abcd".to_string(), "a".to_string()];

        let embeddings = tokio::spawn(async move { provider.embed_documents(&texts).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(embeddings, vec![vec![4.0, 0.5], vec![1.0, 0.5]]);
    }

    #[tokio::test]
    async fn test_chat() {
        let client = client(spawn_mock().await);
        let reply = client
            .complete(&[ChatMessage::system("ctx"), ChatMessage::user("q")])
            .await
            .unwrap();
        assert_eq!(reply, "2 messages");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let client = client("http://127.0.0.1:9".to_string());
        assert!(!EmbeddingProvider::health_check(&client).await.unwrap());
    }
}
