//! OpenAI-compatible API client
//!
//! Covers the two endpoints the tool needs: `/embeddings` for indexing and
//! query vectors, `/chat/completions` for the final answer. Rate limits are
//! retried according to the client's [`RetryPolicy`]; every other failure is
//! classified and returned to the caller.

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::provider::{CompletionProvider, EmbeddingProvider, Message};
use super::retry::RetryPolicy;
use crate::config::AiConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    completion_model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    message: String,
}

impl OpenAiClient {
    /// Create a new client with default models
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(format!("context-forge/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client from the `[ai]` config section, reading the key from
    /// the environment variable it names
    pub fn from_config(config: &AiConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;

        Ok(Self::new(api_key)?
            .with_base_url(&config.base_url)
            .with_embedding_model(&config.embedding_model)
            .with_completion_model(&config.completion_model)
            .with_retry(config.retry))
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    pub fn with_completion_model(mut self, model: &str) -> Self {
        self.completion_model = model.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(classify_failure(status, &text))
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: [text],
        };

        let body = self.post("embeddings", &request).await?;
        let response: EmbeddingResponse = serde_json::from_str(&body)?;

        let model = response.model.unwrap_or_default();
        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(ProviderError::EmptyResponse {
                provider: "openai embeddings",
            })?;

        tracing::debug!("Embedding from {}: {} dimensions", model, embedding.len());
        Ok(embedding)
    }

    async fn complete_once(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.completion_model,
            messages,
        };

        let body = self.post("chat/completions", &request).await?;
        let response: ChatResponse = serde_json::from_str(&body)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ProviderError::EmptyResponse {
                provider: "openai chat",
            })
    }
}

impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.retry.run("embedding", || self.embed_once(text)).await
    }
}

impl CompletionProvider for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, ProviderError> {
        self.retry
            .run("chat completion", || self.complete_once(messages))
            .await
    }
}

/// Map a non-success status to the error class the callers act on
fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else if status.is_client_error() {
        ProviderError::RequestInvalid {
            status: status.as_u16(),
            message,
        }
    } else {
        ProviderError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::Role;

    /// Serve one canned HTTP response per connection, in order.
    async fn spawn_mock_server(responses: Vec<String>) -> u16 {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            for resp in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                read_request(&mut stream).await;
                stream.write_all(resp.as_bytes()).await.ok();
                stream.shutdown().await.ok();
            }
        });

        async fn read_request(stream: &mut tokio::net::TcpStream) {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let Ok(n) = stream.read(&mut chunk).await else {
                    return;
                };
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        return;
                    }
                }
            }
        }

        port
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn client_for(port: u16) -> OpenAiClient {
        OpenAiClient::new("test-key".into())
            .unwrap()
            .with_base_url(&format!("http://127.0.0.1:{port}/v1/"))
            .with_retry(RetryPolicy::fixed(Duration::ZERO).with_max_attempts(3))
    }

    #[test]
    fn test_embedding_request_serialization() {
        let body = EmbeddingRequest {
            model: DEFAULT_EMBEDDING_MODEL,
            input: ["def main(): pass"],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"model":"text-embedding-3-small","input":["def main(): pass"]}"#
        );
    }

    #[test]
    fn test_chat_request_serialization() {
        let messages = [Message::system("be brief"), Message::user("hi")];
        let body = ChatRequest {
            model: DEFAULT_COMPLETION_MODEL,
            messages: &messages,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#"{"role":"system","content":"be brief"}"#));
        assert!(json.contains(r#"{"role":"user","content":"hi"}"#));
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let client = OpenAiClient::new("k".into())
            .unwrap()
            .with_base_url("http://localhost:8080/v1///");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        ));

        let invalid = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"maximum context length exceeded","type":"invalid_request_error"}}"#,
        );
        match invalid {
            ProviderError::RequestInvalid { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "maximum context length exceeded");
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "upstream down"),
            ProviderError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = AiConfig {
            api_key_env: "CONTEXT_FORGE_TEST_UNSET_KEY".into(),
            ..AiConfig::default()
        };
        let err = OpenAiClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("CONTEXT_FORGE_TEST_UNSET_KEY"));
        assert!(!err.is_skippable());
    }

    #[tokio::test]
    async fn test_embed_parses_first_vector() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25,1.0]}],"model":"text-embedding-3-small"}"#;
        let port = spawn_mock_server(vec![http_response("200 OK", body)]).await;

        let vector = client_for(port).embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_retries_after_rate_limit() {
        let ok = r#"{"data":[{"embedding":[1.0,0.0]}]}"#;
        let port = spawn_mock_server(vec![
            http_response("429 Too Many Requests", r#"{"error":{"message":"slow down"}}"#),
            http_response("200 OK", ok),
        ])
        .await;

        let vector = client_for(port).embed("hello").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embed_invalid_request_is_not_retried() {
        let port = spawn_mock_server(vec![http_response(
            "400 Bad Request",
            r#"{"error":{"message":"input too long"}}"#,
        )])
        .await;

        let err = client_for(port).embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::RequestInvalid { status: 400, .. }));
        assert!(err.is_skippable());
    }

    #[tokio::test]
    async fn test_embed_empty_data() {
        let port = spawn_mock_server(vec![http_response("200 OK", r#"{"data":[]}"#)]).await;

        let err = client_for(port).embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let body = r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"StateManager swaps scenes."},"finish_reason":"stop"}]}"#;
        let port = spawn_mock_server(vec![http_response("200 OK", body)]).await;

        let reply = client_for(port)
            .complete(&[Message::system("s"), Message::user("what?")])
            .await
            .unwrap();
        assert_eq!(reply, "StateManager swaps scenes.");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = OpenAiClient::new("k".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:1")
            .with_retry(RetryPolicy::none());
        let err = client.embed("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
        assert!(!err.is_skippable());
    }
}
