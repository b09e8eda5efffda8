//! Error taxonomy for the SOAP generation pipeline.
//!
//! The three kinds stay distinct all the way up to the caller so it can tell
//! "ask the model again" apart from "the AI service is unreachable" and
//! "nothing is configured".

use thiserror::Error;

/// Maximum number of characters of provider payload or model output kept on an error
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Errors raised by context building, model invocation and response parsing
#[derive(Debug, Error)]
pub enum SoapError {
    /// No usable model or provider could be resolved. Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model invocation itself failed (network, auth, rate limit, provider fault)
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        /// Raw error payload (status line, response body) for server-side logs
        payload: Option<String>,
    },

    /// The model answered but the text is not the required JSON object
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        /// Raw model output for server-side logs
        raw: String,
    },
}

pub type Result<T> = std::result::Result<T, SoapError>;

impl SoapError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn provider(message: impl Into<String>, payload: Option<String>) -> Self {
        Self::Provider {
            message: message.into(),
            payload: payload.map(|p| truncate_for_log(&p)),
        }
    }

    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        Self::Parse {
            message: message.into(),
            raw: truncate_for_log(raw),
        }
    }

    /// Whether repeating the same call may succeed without a deployment change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Parse { .. })
    }

    /// Generic message that is safe to show to end users.
    /// Never contains provider payloads, model output or credentials.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "AI service is not configured. Please contact administrator."
            }
            Self::Provider { .. } => "Failed to generate SOAP notes. Please try again.",
            Self::Parse { .. } => "AI response was not valid JSON. Please try again.",
        }
    }

    /// Diagnostic detail attached to the error, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) => None,
            Self::Provider { payload, .. } => payload.as_deref(),
            Self::Parse { raw, .. } => Some(raw.as_str()),
        }
    }
}

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    truncated.push_str("...[truncated]");
    truncated
}
