//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider talking to `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.llm.base_url.clone())
    }

    /// Stream a chat completion, invoking `callback` for every decoded chunk.
    pub async fn chat_stream<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(OllamaChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);

        let ollama_request = OllamaChatRequest::from(request);

        let response = self.http_client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();

                if line.len() <= 1 {
                    continue;
                }

                let line_str = String::from_utf8_lossy(&line[..line.len() - 1]);
                if let Some(response) = parse_chunk(&line_str)? {
                    callback(response);
                }
            }
        }

        if !buffer.is_empty() {
            let line_str = String::from_utf8_lossy(&buffer);
            if let Some(response) = parse_chunk(line_str.trim())? {
                callback(response);
            }
        }

        Ok(())
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::from_config(&crate::Config::default())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(&self, request: ChatRequest) -> Result<ModelReply> {
        let mut accumulator = StreamAccumulator::default();
        self.chat_stream(request, Box::new(|chunk| accumulator.push(chunk)))
            .await?;
        Ok(accumulator.finish())
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self.http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

/// Decodes one NDJSON line. Error payloads become [`ProviderError::Api`].
fn parse_chunk(line: &str) -> Result<Option<OllamaChatResponse>> {
    if line.is_empty() {
        return Ok(None);
    }

    if let Ok(error) = serde_json::from_str::<OllamaErrorResponse>(line) {
        return Err(ProviderError::Api(error.error));
    }

    match serde_json::from_str::<OllamaChatResponse>(line) {
        Ok(response) => Ok(Some(response)),
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream line");
            Ok(None)
        }
    }
}

/// Folds streamed chunks into a single reply.
///
/// Tool calls may arrive in early chunks while the final `done=true` chunk
/// carries none, so they are kept from whichever chunk delivered them.
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    tool_calls: Option<Vec<ToolCall>>,
}

impl StreamAccumulator {
    fn push(&mut self, chunk: OllamaChatResponse) {
        self.content.push_str(&chunk.message.content);

        if let Some(calls) = chunk.message.tool_calls {
            debug!(tool_call_count = calls.len(), "Received tool calls in response");
            let converted = calls.into_iter().map(ToolCall::from);
            self.tool_calls
                .get_or_insert_with(Vec::new)
                .extend(converted);
        }
    }

    fn finish(self) -> ModelReply {
        ModelReply::from_parts(self.content, self.tool_calls)
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    #[serde(default = "default_stream")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

impl From<ChatRequest> for OllamaChatRequest {
    fn from(request: ChatRequest) -> Self {
        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(request.temperature));
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".to_string(), serde_json::json!(max_tokens));
        }

        let tools = request.tools.filter(|tools| !tools.is_empty());

        Self {
            model: request.model,
            messages: request.messages.into_iter().map(OllamaMessage::from).collect(),
            options: Some(options),
            stream: true,
            tools,
        }
    }
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl From<Message> for OllamaMessage {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            tool_calls: message.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|call| OllamaToolCall {
                        function: OllamaToolCallFunction {
                            name: call.function.name,
                            arguments: call.function.arguments,
                        },
                    })
                    .collect()
            }),
            tool_name: message.tool_name,
        }
    }
}

/// One decoded line of an Ollama chat stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    created_at: String,
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    done_reason: Option<String>,
}

impl OllamaChatResponse {
    pub fn content(&self) -> &str {
        &self.message.content
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

impl From<OllamaToolCall> for ToolCall {
    fn from(call: OllamaToolCall) -> Self {
        ToolCall::new(call.function.name, call.function.arguments)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCallFunction {
    name: String,
    arguments: serde_json::Value,
}
