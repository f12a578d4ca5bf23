use crate::chat::{AssistantTurn, ChatMessage, ToolCall, ToolDefinition};
use crate::config::OpenAiConfig;
use crate::embeddings::Embedder;
use crate::text::truncate_chars;
use crate::traits::ReasoningService;
use crate::{ModelError, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible chat completions and embeddings.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, ModelError> {
        let url = Url::parse(&format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        ))?;
        Ok(url)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ModelError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let url = self.endpoint(path)?;
        let mut attempt = 1;

        loop {
            match self.post_once(url.clone(), body).await {
                Ok(parsed) => return Ok(parsed),
                Err(error) if error.is_transient() && attempt < self.config.max_attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "openai request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn post_once<B, T>(&self, url: Url, body: &B) -> Result<T, ModelError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::BackendResponse {
                status: status.as_u16(),
                details: truncate_chars(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        serde_json::from_str(&text).map_err(|error| ModelError::Malformed(error.to_string()))
    }

    pub async fn create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response: EmbeddingResponse = self
            .post_json(
                "embeddings",
                &EmbeddingRequest {
                    model: &self.config.embedding_model,
                    input: texts,
                },
            )
            .await?;

        embeddings_in_input_order(response, texts.len())
    }
}

#[async_trait]
impl ReasoningService for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, ModelError> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
            tools,
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            temperature: self.config.temperature,
        };

        let response: ChatCompletionResponse = self.post_json("chat/completions", &request).await?;
        first_turn(response)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        self.create_embeddings(texts)
            .await
            .map_err(|error| SearchError::BackendResponse {
                backend: "openai-embeddings".to_string(),
                details: error.to_string(),
            })
    }
}

fn first_turn(response: ChatCompletionResponse) -> Result<AssistantTurn, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Malformed("completion has no choices".to_string()))?;

    Ok(AssistantTurn {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}

fn embeddings_in_input_order(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ModelError> {
    if response.data.len() != expected {
        return Err(ModelError::Malformed(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}

fn backoff_delay(attempt: u32) -> Duration {
    let seconds = 1u64 << attempt.saturating_sub(1).min(2);
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_with_tool_call_is_parsed() -> Result<(), Box<dyn std::error::Error>> {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": "1984 fits a story about surveillance.",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "get_summary_by_title",
                            "arguments": "{\"requested_title\": \"1984\"}"
                        }
                    }]
                }
            }]
        });

        let turn = first_turn(serde_json::from_value(raw)?)?;
        assert_eq!(turn.text(), "1984 fits a story about surveillance.");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "call_abc");
        assert_eq!(turn.tool_calls[0].function.name, "get_summary_by_title");
        Ok(())
    }

    #[test]
    fn completion_with_null_tool_calls_is_plain_text() -> Result<(), Box<dyn std::error::Error>> {
        let raw = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "No match.", "tool_calls": null }
            }]
        });
        let turn = first_turn(serde_json::from_value(raw)?)?;
        assert!(turn.tool_calls.is_empty());
        assert_eq!(turn.text(), "No match.");
        Ok(())
    }

    #[test]
    fn completion_without_choices_is_malformed() -> Result<(), serde_json::Error> {
        let response: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] }))?;
        assert!(matches!(first_turn(response), Err(ModelError::Malformed(_))));
        Ok(())
    }

    #[test]
    fn request_omits_tools_when_none_are_declared() -> Result<(), serde_json::Error> {
        let messages = [ChatMessage::user("hello")];
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            tools: &[],
            tool_choice: None,
            temperature: 0.2,
        };
        let value = serde_json::to_value(&request)?;
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        Ok(())
    }

    #[test]
    fn embeddings_are_reordered_by_index() -> Result<(), Box<dyn std::error::Error>> {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        }))?;
        let vectors = embeddings_in_input_order(response, 2)?;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        Ok(())
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(9), Duration::from_secs(4));
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(ModelError::BackendResponse {
            status: 503,
            details: String::new()
        }
        .is_transient());
        assert!(ModelError::BackendResponse {
            status: 429,
            details: String::new()
        }
        .is_transient());
        assert!(!ModelError::BackendResponse {
            status: 401,
            details: String::new()
        }
        .is_transient());
        assert!(!ModelError::MissingToolCall.is_transient());
    }
}
