//! Configuration types.
//!
//! Everything is read from the environment once at startup and handed to
//! component constructors. Components never read the environment themselves.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Settings for the LLM extraction call.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Sampling temperature. Zero keeps generation as deterministic as the
    /// provider allows.
    pub temperature: f32,
    /// Output token cap. The model echoes the full body, so this must leave
    /// room for long emails; truncated output fails to parse and falls back.
    pub max_tokens: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Settings for reply drafting.
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sign-off line the model is told to use.
    pub signature: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
            signature: "Property Management Team".to_string(),
        }
    }
}

/// Settings for the triage binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum unread messages fetched per run.
    pub fetch_limit: usize,
    /// Directory where action items are written.
    pub action_dir: PathBuf,
    /// Seed for the mock tenant context. `None` draws from entropy.
    pub context_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 5,
            action_dir: PathBuf::from("action_items"),
            context_seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let context_seed = match std::env::var("TRIAGE_CONTEXT_SEED") {
            Ok(raw) => Some(parse_value("TRIAGE_CONTEXT_SEED", &raw)?),
            Err(_) => None,
        };

        Ok(Self {
            fetch_limit: env_parse("TRIAGE_FETCH_LIMIT", defaults.fetch_limit)?,
            action_dir: std::env::var("TRIAGE_ACTION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.action_dir),
            context_seed,
        })
    }
}

/// Read a string variable, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse a variable, falling back to `default` when unset.
///
/// A set-but-unparsable value is an error rather than a silent default.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}
