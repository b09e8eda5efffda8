//! SOAP generation pipeline
//!
//! context -> prompt -> model -> parser, one stateless round trip per call.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::consultation::{Consultation, ConsultationRecord};
use crate::context::{build_context, ConsultationContext};
use crate::error::{Result, SoapError};
use crate::parser::{parse_soap_response, SoapResult};
use crate::prompt::{format_prompt, FormattedPrompt, PROMPT_VERSION};
use crate::provider::{invoke, CompletionClient, HttpCompletionClient, LlmSettings};

/// Result of one generation, with the context that was sent to the model
#[derive(Debug, Clone, Serialize)]
pub struct SoapGeneration {
    pub soap: SoapResult,
    pub context_used: ConsultationContext,
    pub model_used: String,
    pub prompt_version: &'static str,
    pub generated_at: String,
}

/// Generates SOAP drafts. Holds no per-request state and is shared across requests.
#[derive(Clone)]
pub struct SoapGenerator {
    llm: LlmSettings,
    client: Arc<dyn CompletionClient>,
}

impl SoapGenerator {
    pub fn new(llm: LlmSettings, client: Arc<dyn CompletionClient>) -> Self {
        Self { llm, client }
    }

    /// Generator backed by the HTTP provider client
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = HttpCompletionClient::new(settings.request_timeout())?;
        Ok(Self::new(settings.llm.clone(), Arc::new(client)))
    }

    /// Whether a model can be resolved at all
    pub fn is_configured(&self) -> bool {
        self.llm.is_configured()
    }

    /// Build the context and prompt without calling a model
    pub fn prepare(
        &self,
        current: &ConsultationRecord,
        prior_visits: &[Consultation],
    ) -> (ConsultationContext, FormattedPrompt) {
        let context = build_context(current, prior_visits);
        let prompt = format_prompt(&context);
        (context, prompt)
    }

    /// Generate a SOAP draft for the current visit
    pub async fn generate(
        &self,
        current: &ConsultationRecord,
        prior_visits: &[Consultation],
    ) -> Result<SoapGeneration> {
        let model_used = self.llm.resolve()?.model_identifier;
        let (context, prompt) = self.prepare(current, prior_visits);
        info!(
            "Generating SOAP note for consultation {} with {} ({} vitals, {} prior visits)",
            current.consultation.id,
            model_used,
            context.vital_signs.len(),
            context.patient_history.len()
        );
        let start = Instant::now();

        let raw = invoke(
            &prompt.system_instructions,
            &prompt.user_message,
            &self.llm,
            self.client.as_ref(),
        )
        .await?;

        let soap = parse_soap_response(&raw).map_err(|e| {
            if let SoapError::Parse { raw, .. } = &e {
                error!(
                    "Unparseable SOAP response for consultation {}: {}",
                    current.consultation.id, raw
                );
            }
            e
        })?;

        if soap.filled_sections() < 4 {
            warn!(
                "SOAP draft for consultation {} has only {}/4 sections",
                current.consultation.id,
                soap.filled_sections()
            );
        }
        info!(
            "Generated SOAP note for consultation {} in {:?}",
            current.consultation.id,
            start.elapsed()
        );

        Ok(SoapGeneration {
            soap,
            context_used: context,
            model_used,
            prompt_version: PROMPT_VERSION,
            generated_at: Utc::now().to_rfc3339(),
        })
    }
}
