//! Anthropic Messages API client (`/v1/messages`)
//!
//! The system turn travels in the top-level `system` field; every other turn goes
//! into `messages`.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{post_json, ChatMessage, ModelInvocationConfig};
use crate::error::{Result, SoapError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Output token budget; a four-section SOAP draft fits comfortably
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

pub(crate) fn build_request(config: &ModelInvocationConfig, messages: &[ChatMessage]) -> MessagesRequest {
    let system = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    MessagesRequest {
        model: config.wire_model().to_string(),
        max_tokens: MAX_TOKENS,
        system,
        messages: messages.iter().filter(|m| m.role != "system").cloned().collect(),
    }
}

fn headers(config: &ModelInvocationConfig) -> Result<HeaderMap> {
    let key = config
        .api_key
        .as_deref()
        .ok_or_else(|| SoapError::configuration("ANTHROPIC_API_KEY is not set"))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-api-key",
        HeaderValue::from_str(key)
            .map_err(|_| SoapError::configuration("API key contains invalid header characters"))?,
    );
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Concatenated text blocks of the reply
pub(crate) fn extract_text(response: MessagesResponse) -> Result<String> {
    let text: String = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(SoapError::provider(
            "Response contained no text content",
            response.stop_reason,
        ));
    }
    Ok(text)
}

pub(crate) async fn complete(
    client: &reqwest::Client,
    config: &ModelInvocationConfig,
    messages: &[ChatMessage],
) -> Result<String> {
    let url = format!("{}/v1/messages", config.api_base);
    let request = build_request(config, messages);

    let body = post_json(client, &url, headers(config)?, &request, config.provider).await?;

    let response: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
        SoapError::provider(
            format!("Failed to parse anthropic response envelope: {}", e),
            Some(body.chars().take(500).collect()),
        )
    })?;
    debug!(
        "anthropic returned {} content blocks (stop_reason {:?})",
        response.content.len(),
        response.stop_reason
    );

    extract_text(response)
}
