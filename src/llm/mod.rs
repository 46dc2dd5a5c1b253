//! LLM integration.
//!
//! The pipeline talks to text generation only through the `LlmProvider`
//! trait. `create_provider` builds the concrete OpenAI-compatible client
//! from an explicit `LlmConfig`; there is no ambient API key.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{env_or, env_parse};
use crate::error::{ConfigError, LlmError};

/// Default model for extraction and replies.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
    /// Per-request HTTP timeout. The pipeline adds no deadline of its own.
    pub timeout: Duration,
}

impl LlmConfig {
    /// Build config from environment variables.
    ///
    /// `OPENAI_API_KEY` is required (`OPEN_AI_KEY` is accepted as an alias).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPEN_AI_KEY"))
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            api_key: secrecy::SecretString::from(api_key),
            model: env_or("TRIAGE_MODEL", DEFAULT_MODEL),
            base_url: env_or("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 60)?),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiProvider::new(
        config.api_key.clone(),
        &config.base_url,
        &config.model,
        config.timeout,
    )?;
    tracing::info!("Using OpenAI-compatible API (model: {})", config.model);
    Ok(Arc::new(provider))
}
