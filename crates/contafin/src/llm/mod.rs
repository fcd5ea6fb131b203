use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{LlmConfig, RetryConfig};

/// Returned once every attempt against the inference endpoint has failed.
pub const UNAVAILABLE_REPLY: &str = "Lo siento, estoy experimentando problemas técnicos de comunicación. ¿Podríamos intentarlo más tarde?";

/// Returned when the endpoint answers successfully but without reply text.
pub const MALFORMED_REPLY: &str =
    "Lo siento, no pude generar una respuesta apropiada en este momento.";

const ERROR_BODY_LOG_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat/completion access to a language model.
///
/// Implementations never surface transport errors to callers: exhausted
/// retries resolve to [`UNAVAILABLE_REPLY`] and unusable payloads to
/// [`MALFORMED_REPLY`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> String;
    async fn complete(&self, prompt: &str) -> String;
    fn identity(&self) -> LlmIdentity;
}

#[derive(Debug, Default)]
pub struct LocalStubClient;

#[async_trait]
impl LlmClient for LocalStubClient {
    async fn chat(&self, messages: &[ChatMessage]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.trim())
            .unwrap_or_default();
        let turns = messages
            .iter()
            .filter(|message| message.role != Role::System)
            .count();
        format!("ContaFin (modo local) recibió: {last_user} [turnos: {turns}]")
    }

    async fn complete(&self, prompt: &str) -> String {
        let tail = prompt
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix("Usuario:"))
            .map(str::trim)
            .unwrap_or_default();
        format!("ContaFin (modo local, completion) recibió: {tail}")
    }

    fn identity(&self) -> LlmIdentity {
        LlmIdentity::new("local_stub", None)
    }
}

/// Failure of a single attempt against the inference endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Chat,
    Generate,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::Chat => "/api/chat",
            Endpoint::Generate => "/api/generate",
        }
    }

    fn extract(self, payload: &Value) -> Option<&str> {
        match self {
            Endpoint::Chat => payload
                .get("message")
                .and_then(|message| message.get("content"))
                .and_then(Value::as_str),
            Endpoint::Generate => payload.get("response").and_then(Value::as_str),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Client for an Ollama-compatible server (`/api/chat`, `/api/generate`).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    fallback_url: String,
    model: String,
    temperature: f32,
    retry: RetryConfig,
}

impl OllamaClient {
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fallback_url: config.fallback_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            retry: config.retry,
        })
    }

    async fn send_with_retry(&self, endpoint: Endpoint, body: &Value) -> String {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 0..attempts {
            match self.attempt(endpoint, body, attempt).await {
                Ok(payload) => {
                    return match endpoint.extract(&payload) {
                        Some(text) => text.to_string(),
                        None => {
                            error!(%endpoint, payload = %payload, "unexpected inference payload");
                            MALFORMED_REPLY.to_string()
                        }
                    };
                }
                Err(err) => {
                    warn!(
                        %endpoint,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %err,
                        "inference attempt failed"
                    );
                    if attempt + 1 < attempts {
                        let delay = self.retry.delay_after(attempt);
                        let delay_ms = delay.as_millis() as u64;
                        info!(delay_ms, "retrying inference request");
                        sleep(delay).await;
                    }
                }
            }
        }

        UNAVAILABLE_REPLY.to_string()
    }

    async fn attempt(
        &self,
        endpoint: Endpoint,
        body: &Value,
        attempt: u32,
    ) -> Result<Value, InferenceError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        info!(%url, attempt = attempt + 1, "contacting inference endpoint");
        let mut response = self.post(&url, body).await?;

        if response.status() == StatusCode::FORBIDDEN && attempt == 0 {
            let alternate = format!("{}{}", self.fallback_url, endpoint.path());
            info!(%url, %alternate, "primary endpoint answered 403, trying alternate");
            response = self.post(&alternate, body).await?;
        }

        let status = response.status();
        let url = response.url().to_string();
        if status.is_client_error() || status.is_server_error() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(ERROR_BODY_LOG_LIMIT).collect();
            error!(%url, %status, detail = %detail, "inference endpoint returned an error");
            return Err(InferenceError::Status { url, status });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| InferenceError::Decode { url, source })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, InferenceError> {
        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| InferenceError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> String {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        self.send_with_retry(Endpoint::Chat, &body).await
    }

    async fn complete(&self, prompt: &str) -> String {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        self.send_with_retry(Endpoint::Generate, &body).await
    }

    fn identity(&self) -> LlmIdentity {
        LlmIdentity::new("ollama", Some(self.model.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct LlmIdentity {
    pub provider: &'static str,
    pub model: Option<String>,
}

impl LlmIdentity {
    pub fn new(provider: &'static str, model: Option<String>) -> Self {
        Self { provider, model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use httpmock::prelude::*;
    use std::time::{Duration, Instant};

    fn config_for(base_url: String, fallback_url: String, base_delay_ms: u64) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Ollama,
            base_url,
            fallback_url,
            model: "llama3:8b".to_string(),
            temperature: 0.7,
            timeout_secs: 5,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms,
            },
        }
    }

    #[tokio::test]
    async fn chat_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"model":"llama3:8b","stream":false}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"message":{"role":"assistant","content":"Hola desde ContaFin"}}"#);
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(server.base_url(), server.base_url(), 10))
                .expect("client should build");
        let reply = client
            .chat(&[
                ChatMessage::system("contexto"),
                ChatMessage::user("¿Cómo calculo el IVA?"),
            ])
            .await;

        assert_eq!(reply, "Hola desde ContaFin");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn completion_reads_response_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("Usuario: hola");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"response":"Texto generado","done":true}"#);
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(server.base_url(), server.base_url(), 10))
                .expect("client should build");
        let reply = client.complete("Usuario: hola\nContaFin: ").await;

        assert_eq!(reply, "Texto generado");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_retries_return_apology_after_backoff() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(503).body("upstream unavailable");
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(server.base_url(), server.base_url(), 100))
                .expect("client should build");

        let started = Instant::now();
        let reply = client.chat(&[ChatMessage::user("hola")]).await;
        let elapsed = started.elapsed();

        assert_eq!(reply, UNAVAILABLE_REPLY);
        mock.assert_hits_async(3).await;
        // 100ms after the first failure, 200ms after the second, none after the last.
        assert!(
            elapsed >= Duration::from_millis(300),
            "expected backoff delays, elapsed {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_apology() {
        let client = OllamaClient::from_config(&config_for(
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:9".to_string(),
            1,
        ))
        .expect("client should build");

        let reply = client.complete("Usuario: hola").await;
        assert_eq!(reply, UNAVAILABLE_REPLY);
    }

    #[tokio::test]
    async fn forbidden_first_attempt_uses_alternate_endpoint() {
        let primary = MockServer::start_async().await;
        let alternate = MockServer::start_async().await;

        let forbidden = primary
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(403).body(r#"{"error":"forbidden"}"#);
            })
            .await;
        let local = alternate
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"message":{"content":"respuesta local"}}"#);
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(primary.base_url(), alternate.base_url(), 10))
                .expect("client should build");
        let reply = client.chat(&[ChatMessage::user("hola")]).await;

        assert_eq!(reply, "respuesta local");
        forbidden.assert_hits_async(1).await;
        local.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn malformed_payload_returns_fixed_reply_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"unexpected":true}"#);
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(server.base_url(), server.base_url(), 10))
                .expect("client should build");
        let reply = client.chat(&[ChatMessage::user("hola")]).await;

        assert_eq!(reply, MALFORMED_REPLY);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn non_json_body_is_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200).body("<html>tunnel page</html>");
            })
            .await;

        let client =
            OllamaClient::from_config(&config_for(server.base_url(), server.base_url(), 1))
                .expect("client should build");
        let reply = client.complete("Usuario: hola").await;

        assert_eq!(reply, UNAVAILABLE_REPLY);
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn stub_echoes_last_user_turn() {
        let client = LocalStubClient;
        let reply = client
            .chat(&[
                ChatMessage::system("contexto"),
                ChatMessage::user("primero"),
                ChatMessage::assistant("respuesta"),
                ChatMessage::user("segundo"),
            ])
            .await;
        assert!(reply.contains("segundo"));
        assert!(reply.contains("turnos: 3"));

        let completion = client.complete("contexto\nUsuario: ¿qué es el ROE?\nContaFin: ").await;
        assert!(completion.contains("¿qué es el ROE?"));
    }

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let value = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "ok"}));
    }
}
