use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::provider::{LlmSettings, Provider, ProviderCredential, DEFAULT_TIMEOUT};

/// Providers auto-selected from environment credentials, highest priority first
const CREDENTIAL_PRIORITY: [(Provider, &str, &str); 2] = [
    (Provider::Anthropic, "ANTHROPIC_API_KEY", "ANTHROPIC_API_BASE"),
    (Provider::OpenAi, "OPENAI_API_KEY", "OPENAI_API_BASE"),
];

/// Service configuration
///
/// Read once per process: defaults, then the JSON config file, then environment
/// variables. Command-line flags are applied on top by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schema_version: u32,
    pub llm: LlmSettings,
    pub request_timeout_secs: u64,
    pub bind_addr: String,
    /// Include internal error text in HTTP error responses
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            llm: LlmSettings::default(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            bind_addr: "127.0.0.1:8000".to_string(),
            debug: false,
        }
    }
}

impl Settings {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".clinic-soap"))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load settings from `path` (or the default location) and overlay the
    /// process environment. An explicit path must exist; the default one may not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::config_path() {
                Ok(default_path) if default_path.exists() => Self::load_file(&default_path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load a JSON config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(model) = var("DEFAULT_LLM_MODEL") {
            self.llm.default_model = Some(model);
        }

        for (provider, key_var, base_var) in CREDENTIAL_PRIORITY {
            let key = var(key_var);
            let base = var(base_var);
            if key.is_some() || base.is_some() {
                self.upsert_credential(provider, key, base);
            }
        }

        if let Some(base) = var("OLLAMA_API_BASE") {
            self.upsert_credential(Provider::Ollama, None, Some(base));
        }

        if let Some(raw) = var("LLM_REQUEST_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!("Ignoring invalid LLM_REQUEST_TIMEOUT_SECS value {:?}", raw),
            }
        }

        if let Some(bind) = var("CLINIC_SOAP_BIND") {
            self.bind_addr = bind;
        }

        if let Some(flag) = var("CLINIC_SOAP_DEBUG") {
            self.debug = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    fn upsert_credential(&mut self, provider: Provider, api_key: Option<String>, api_base: Option<String>) {
        let credentials = &mut self.llm.credentials;
        let index = match credentials.iter().position(|c| c.provider == provider) {
            Some(index) => index,
            None => {
                credentials.push(ProviderCredential::new(provider, ""));
                credentials.len() - 1
            }
        };

        let credential = &mut credentials[index];
        if let Some(key) = api_key {
            credential.api_key = key;
        }
        if api_base.is_some() {
            credential.api_base = api_base;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
