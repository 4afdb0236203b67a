//! Configuration loading, validation, and management for TracePilot.
//!
//! Loads configuration from `~/.tracepilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.tracepilot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the default provider (env: `TRACEPILOT_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default completion model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Embedding model for semantic indexing (None = keyword search only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Overrides the built-in assistant system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Token budget configuration
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Retrieval breadth configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Knowledge base loading configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            embedding_model: None,
            system_prompt_override: None,
            budget: BudgetConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            knowledge: KnowledgeConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// How the total prompt budget is carved up.
///
/// The splits are design constants, not derived: debugging needs raw event
/// evidence, explanatory questions need documentation. They are exposed
/// here as configurable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total prompt token budget per chat turn
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    /// Reserved for the assistant system prompt
    #[serde(default = "default_system_reserve")]
    pub system_prompt_reserve: usize,

    /// Reserved for the model's own response
    #[serde(default = "default_response_reserve")]
    pub response_reserve: usize,

    /// Split for debug intent (events dominate)
    #[serde(default = "default_debug_split")]
    pub debug: SliceSplit,

    /// Split for analytics intent (balanced, events-leaning)
    #[serde(default = "default_analytics_split")]
    pub analytics: SliceSplit,

    /// Split for general intent (documentation dominates)
    #[serde(default = "default_general_split")]
    pub general: SliceSplit,
}

fn default_total_tokens() -> usize {
    8000
}
fn default_system_reserve() -> usize {
    600
}
fn default_response_reserve() -> usize {
    1000
}
fn default_debug_split() -> SliceSplit {
    SliceSplit {
        events: 0.6,
        docs: 0.1,
        history: 0.3,
    }
}
fn default_analytics_split() -> SliceSplit {
    SliceSplit {
        events: 0.5,
        docs: 0.2,
        history: 0.3,
    }
}
fn default_general_split() -> SliceSplit {
    SliceSplit {
        events: 0.2,
        docs: 0.5,
        history: 0.3,
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            system_prompt_reserve: default_system_reserve(),
            response_reserve: default_response_reserve(),
            debug: default_debug_split(),
            analytics: default_analytics_split(),
            general: default_general_split(),
        }
    }
}

/// Fractional allocation of the available budget across context slices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SliceSplit {
    pub events: f32,
    pub docs: f32,
    pub history: f32,
}

impl SliceSplit {
    pub fn sum(&self) -> f32 {
        self.events + self.docs + self.history
    }
}

/// Retrieval breadths per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Event candidates requested for debug intent
    #[serde(default = "default_debug_event_k")]
    pub debug_event_k: usize,

    /// Event candidates requested for other intents
    #[serde(default = "default_event_k")]
    pub default_event_k: usize,

    /// Documentation candidates requested (and the formatting cap)
    #[serde(default = "default_document_k")]
    pub document_k: usize,
}

fn default_debug_event_k() -> usize {
    15
}
fn default_event_k() -> usize {
    5
}
fn default_document_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            debug_event_k: default_debug_event_k(),
            default_event_k: default_event_k(),
            document_k: default_document_k(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8420
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Knowledge base loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directories scanned for .md/.txt/.pdf documents at startup
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    /// Target chunk size in estimated tokens
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    /// Overlap between adjacent chunks in estimated tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_tokens: usize,
}

fn default_chunk_tokens() -> usize {
    300
}
fn default_chunk_overlap() -> usize {
    40
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            chunk_tokens: default_chunk_tokens(),
            chunk_overlap_tokens: default_chunk_overlap(),
        }
    }
}

/// Per-provider overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AppConfig {
    /// The configuration directory: `~/.tracepilot`.
    pub fn config_dir() -> PathBuf {
        std::env::var("TRACEPILOT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                Path::new(&home).join(".tracepilot")
            })
    }

    /// The default config file path: `~/.tracepilot/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path. A missing file yields defaults; env
    /// overrides are applied either way.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path, then apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "Loading config file");
            toml::from_str(&raw)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("TRACEPILOT_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("TRACEPILOT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Ok(model) = std::env::var("TRACEPILOT_MODEL") {
            self.default_model = model;
        }
        if let Ok(port) = std::env::var("TRACEPILOT_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
    }

    /// Validate all settings. Called on every load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (intent, split) in [
            ("debug", &self.budget.debug),
            ("analytics", &self.budget.analytics),
            ("general", &self.budget.general),
        ] {
            for (name, value) in [
                ("events", split.events),
                ("docs", split.docs),
                ("history", split.history),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Invalid(format!(
                        "budget.{intent}.{name} must be in [0, 1], got {value}"
                    )));
                }
            }
            if split.sum() > 1.0 + 1e-4 {
                return Err(ConfigError::Invalid(format!(
                    "budget.{intent} slices sum to {:.2}, must be ≤ 1.0",
                    split.sum()
                )));
            }
        }

        let reserves = self.budget.system_prompt_reserve + self.budget.response_reserve;
        if reserves >= self.budget.total_tokens {
            return Err(ConfigError::Invalid(format!(
                "budget reserves ({reserves}) consume the whole budget ({})",
                self.budget.total_tokens
            )));
        }

        if self.retrieval.debug_event_k == 0 || self.retrieval.default_event_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval event breadths must be ≥ 1".into(),
            ));
        }

        if self.knowledge.chunk_overlap_tokens >= self.knowledge.chunk_tokens {
            return Err(ConfigError::Invalid(
                "knowledge.chunk_overlap_tokens must be smaller than chunk_tokens".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the API key for a provider: provider-specific first, then the
    /// top-level key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }
}
