//! OpenAI-compatible chat completions (`/v1/chat/completions`)
//!
//! Used for OpenAI itself and for local Ollama servers, which expose the same API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{post_json, ChatMessage, ModelInvocationConfig};
use crate::error::{Result, SoapError};

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

/// Assistant message; `content` is null when the model refuses or calls a tool
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

pub(crate) fn build_request(config: &ModelInvocationConfig, messages: &[ChatMessage]) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.wire_model().to_string(),
        messages: messages.to_vec(),
        stream: false,
        max_tokens: None,
    }
}

fn headers(config: &ModelInvocationConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| SoapError::configuration("API key contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

/// Raw text of the first choice
pub(crate) fn extract_content(response: ChatCompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SoapError::provider("No response choices returned", None))?;

    choice
        .message
        .content
        .ok_or_else(|| SoapError::provider("Response choice has no text content", choice.finish_reason))
}

pub(crate) async fn complete(
    client: &reqwest::Client,
    config: &ModelInvocationConfig,
    messages: &[ChatMessage],
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.api_base);
    let request = build_request(config, messages);

    let body = post_json(client, &url, headers(config)?, &request, config.provider).await?;

    let response: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
        SoapError::provider(
            format!("Failed to parse {} response envelope: {}", config.provider, e),
            Some(body.chars().take(500).collect()),
        )
    })?;
    debug!(
        "{} returned {} choices (model {})",
        config.provider,
        response.choices.len(),
        response.model
    );

    extract_content(response)
}
