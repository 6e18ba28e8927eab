// sentrygate-gateway/src/provider.rs
// ============================================================================
// Module: OpenAI-Compatible Model Provider
// Description: Async ModelProvider implementation calling an OpenAI-style
// chat completions endpoint.
// Purpose: The concrete backend the sandbox (C6) invokes.
// Dependencies: reqwest, sentrygate-core
// ============================================================================

//! ## Overview
//! `spec.md` treats the model backend as an opaque HTTP dependency behind
//! the [`sentrygate_core::ModelProvider`] trait; this is the one concrete
//! implementation shipped, targeting any OpenAI-compatible chat completions
//! API. `tools` on the request maps to the endpoint's `tools` field only
//! when non-empty, since an empty array and an absent field are not
//! always treated identically by every compatible backend.

use async_trait::async_trait;
use sentrygate_core::ModelCompletion;
use sentrygate_core::ModelProvider;
use sentrygate_core::ModelProviderError;
use sentrygate_core::ModelRequest;
use serde::Deserialize;
use serde::Serialize;

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    /// Builds a provider targeting `base_url` (without a trailing slash)
    /// using `api_key` and `model`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    function: ToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ToolFunction<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    completion_tokens: Option<u32>,
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: ModelRequest) -> Result<ModelCompletion, ModelProviderError> {
        let tools = request
            .tools
            .iter()
            .map(|name| ToolSpec {
                kind: "function",
                function: ToolFunction { name },
            })
            .collect();

        let body = ChatCompletionRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: &request.input_text,
            }],
            tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ModelProviderError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ModelProviderError::Transport(format!("provider returned status {}", response.status())));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ModelProviderError::InvalidResponse(err.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelProviderError::InvalidResponse("no completion choice returned".to_string()))?;

        Ok(ModelCompletion {
            text,
            tokens_used: parsed.usage.and_then(|usage| usage.completion_tokens),
        })
    }
}
