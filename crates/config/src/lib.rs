//! Configuration loading, validation, and management for Juliet.
//!
//! Loads configuration from `~/.juliet/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.juliet/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Who is talking to whom
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Long-term memory and recency cache settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retrieval ranking and enabled sources
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Prompt assembly settings
    #[serde(default)]
    pub context: ContextConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("identity", &self.identity)
            .field("provider", &self.provider)
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .field("context", &self.context)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Assistant name; also selects `isos/<name>/` under the data directory
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// Speaker name recorded for user messages
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Conversation the CLI appends to
    #[serde(default = "default_conversation_id")]
    pub conversation_id: String,
}

fn default_assistant_name() -> String {
    "juliet".into()
}
fn default_user_name() -> String {
    "user".into()
}
fn default_conversation_id() -> String {
    "default".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            user_name: default_user_name(),
            conversation_id: default_conversation_id(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider label used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Request timeout; a hung completion is reported as a failure
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "xai".into()
}
fn default_api_url() -> String {
    "https://api.x.ai/v1".into()
}
fn default_model() -> String {
    "grok-4-1-fast-non-reasoning".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Root of persisted state. Relative paths resolve against the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Recency cache size in turns
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Collection completed turns are written to
    #[serde(default = "default_episodic_collection")]
    pub episodic_collection: String,

    /// Append every stored document to `episodic_memory.jsonl`
    #[serde(default = "default_true")]
    pub audit_enabled: bool,

    /// Largest batch the local vector store accepts
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_cache_capacity() -> usize {
    20
}
fn default_episodic_collection() -> String {
    "episodic".into()
}
fn default_max_batch_size() -> usize {
    512
}
fn default_true() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_capacity: default_cache_capacity(),
            episodic_collection: default_episodic_collection(),
            audit_enabled: true,
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Parameters of the adaptive similarity ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankerConfig {
    /// Maximum chunks kept per source
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound on candidates fetched from the store
    #[serde(default = "default_max_overfetch")]
    pub max_overfetch: usize,

    /// Absolute similarity floor
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// The cutoff is `best / dynamic_multiplier`, floored by `min_similarity`
    #[serde(default = "default_dynamic_multiplier")]
    pub dynamic_multiplier: f32,
}

fn default_top_k() -> usize {
    5
}
fn default_max_overfetch() -> usize {
    40
}
fn default_min_similarity() -> f32 {
    0.15
}
fn default_dynamic_multiplier() -> f32 {
    4.0
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_overfetch: default_max_overfetch(),
            min_similarity: default_min_similarity(),
            dynamic_multiplier: default_dynamic_multiplier(),
        }
    }
}

impl RankerConfig {
    /// Number of raw candidates to request: `min(top_k * 4, max_overfetch)`.
    pub fn fetch_k(&self) -> usize {
        (self.top_k.saturating_mul(4)).min(self.max_overfetch)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::ValidationError("retrieval.top_k must be >= 1".into()));
        }
        if self.max_overfetch == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_overfetch must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_similarity must be between 0.0 and 1.0".into(),
            ));
        }
        if !self.dynamic_multiplier.is_finite() || self.dynamic_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.dynamic_multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(flatten)]
    pub ranker: RankerConfig,

    #[serde(default = "default_true")]
    pub semantic: bool,

    #[serde(default = "default_true")]
    pub episodic: bool,

    #[serde(default = "default_true")]
    pub procedural: bool,

    #[serde(default = "default_true")]
    pub facts: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            ranker: RankerConfig::default(),
            semantic: true,
            episodic: true,
            procedural: true,
            facts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Soft budget for the assembled prompt; exceeding it logs a warning
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Forced assistant continuation marker
    #[serde(default = "default_assistant_prefix")]
    pub assistant_prefix: String,

    /// Tag wrapped around the live user request
    #[serde(default = "default_user_tag")]
    pub user_tag: String,
}

fn default_max_context_tokens() -> usize {
    16_384
}
fn default_assistant_prefix() -> String {
    "<assistant>".into()
}
fn default_user_tag() -> String {
    "user".into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            assistant_prefix: default_assistant_prefix(),
            user_tag: default_user_tag(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.juliet/config.toml).
    ///
    /// Environment variables override the file:
    /// - `JULIET_API_KEY` (highest priority), `XAI_API_KEY`, `OPENAI_API_KEY`
    /// - `JULIET_API_URL`
    /// - `JULIET_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("JULIET_API_KEY")
                .ok()
                .or_else(|| std::env::var("XAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("JULIET_API_URL") {
            config.provider.api_url = url;
        }

        if let Ok(model) = std::env::var("JULIET_MODEL") {
            config.provider.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".juliet")
    }

    /// Root of persisted state for the configured assistant and user:
    /// `<data_dir>/isos/<assistant>/users/<user>`.
    pub fn user_data_dir(&self) -> PathBuf {
        let root = match &self.memory.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => Self::config_dir().join(dir),
            None => Self::config_dir(),
        };
        root.join("isos")
            .join(&self.identity.assistant_name)
            .join("users")
            .join(&self.identity.user_name)
    }

    /// Directory holding the local vector store collections.
    pub fn store_dir(&self) -> PathBuf {
        self.user_data_dir().join("vector_store")
    }

    /// Audit file for stored documents, if enabled.
    pub fn audit_path(&self) -> Option<PathBuf> {
        self.memory
            .audit_enabled
            .then(|| self.user_data_dir().join("episodic_memory.jsonl"))
    }

    /// Conversation log file.
    pub fn conversations_path(&self) -> PathBuf {
        self.user_data_dir().join("conversations.json")
    }

    /// Instructions file for the configured assistant.
    pub fn instructions_path(&self) -> PathBuf {
        let root = match &self.memory.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => Self::config_dir().join(dir),
            None => Self::config_dir(),
        };
        root.join("isos")
            .join(&self.identity.assistant_name)
            .join("instructions.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "memory.cache_capacity must be >= 1".into(),
            ));
        }

        if self.memory.max_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_batch_size must be >= 1".into(),
            ));
        }

        if self.identity.assistant_name.trim().is_empty() || self.identity.user_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity.assistant_name and identity.user_name must not be empty".into(),
            ));
        }

        self.retrieval.ranker.validate()
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            provider: ProviderConfig::default(),
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.cache_capacity, 20);
        assert_eq!(config.retrieval.ranker.top_k, 5);
        assert_eq!(config.context.assistant_prefix, "<assistant>");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.retrieval.ranker, config.retrieval.ranker);
    }

    #[test]
    fn fetch_k_is_capped_by_overfetch() {
        let ranker = RankerConfig {
            top_k: 5,
            max_overfetch: 12,
            ..RankerConfig::default()
        };
        assert_eq!(ranker.fetch_k(), 12);

        let ranker = RankerConfig {
            top_k: 2,
            ..RankerConfig::default()
        };
        assert_eq!(ranker.fetch_k(), 8);
    }

    #[test]
    fn invalid_multiplier_rejected() {
        let config = AppConfig {
            retrieval: RetrievalConfig {
                ranker: RankerConfig {
                    dynamic_multiplier: 0.5,
                    ..RankerConfig::default()
                },
                ..RetrievalConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let mut config = AppConfig::default();
        config.memory.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.identity.assistant_name, "juliet");
    }

    #[test]
    fn retrieval_section_parsing() {
        let toml_str = r#"
[identity]
assistant_name = "romeo"
user_name = "wallscreet"

[retrieval]
top_k = 3
min_similarity = 0.2
procedural = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.identity.assistant_name, "romeo");
        assert_eq!(config.retrieval.ranker.top_k, 3);
        assert!((config.retrieval.ranker.min_similarity - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.ranker.max_overfetch, 40);
        assert!(!config.retrieval.procedural);
        assert!(config.retrieval.semantic);
    }

    #[test]
    fn data_paths_follow_identity() {
        let mut config = AppConfig::default();
        config.memory.data_dir = Some(PathBuf::from("/var/juliet"));
        config.identity.user_name = "wallscreet".into();
        assert_eq!(
            config.user_data_dir(),
            PathBuf::from("/var/juliet/isos/juliet/users/wallscreet")
        );
        assert_eq!(
            config.audit_path().unwrap(),
            PathBuf::from("/var/juliet/isos/juliet/users/wallscreet/episodic_memory.jsonl")
        );
        config.memory.audit_enabled = false;
        assert!(config.audit_path().is_none());
    }

    #[test]
    fn load_from_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[retrieval]\ntop_k = 7\n").unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().retrieval.ranker.top_k, 7);

        std::fs::write(&path, "[retrieval]\ntop_k = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, "[memory\n").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("xai-secret".into());
        let text = format!("{config:?}");
        assert!(!text.contains("xai-secret"));
        assert!(text.contains("[REDACTED]"));
    }
}
