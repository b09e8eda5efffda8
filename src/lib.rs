pub mod config;
pub mod consultation;
pub mod context;
pub mod error;
pub mod generator;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod server;


pub use config::Settings;
pub use consultation::{ConsultationRecord, ConsultationSource, InMemoryConsultations};
pub use context::{build_context, ConsultationContext};
pub use error::{Result, SoapError};
pub use generator::{SoapGeneration, SoapGenerator};
pub use parser::{parse_soap_response, SoapResult};
pub use prompt::{format_prompt, FormattedPrompt};
pub use provider::{invoke, CompletionClient, LlmSettings, ModelInvocationConfig};
