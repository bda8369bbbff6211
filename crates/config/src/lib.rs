//! Configuration loading, validation, and management for planbot.
//!
//! Loads configuration from `~/.planbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.planbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Chat model used by the planners
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Image model used by `generate_images`
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Embedding model used by `search_documents`
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Conversation behaviour
    #[serde(default)]
    pub bot: BotConfig,

    /// Translation service
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Supported languages: short code → display name
    #[serde(default)]
    pub languages: BTreeMap<String, String>,

    /// Document search index
    #[serde(default)]
    pub search: SearchConfig,

    /// Web search service
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Structured data source
    #[serde(default)]
    pub sql: SqlConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_image_model() -> String {
    "dall-e-3".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("embedding_model", &self.embedding_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("bot", &self.bot)
            .field("translator", &self.translator)
            .field("languages", &self.languages)
            .field("search", &self.search)
            .field("web_search", &self.web_search)
            .field("sql", &self.sql)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Which planning strategy the bot uses. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    /// Build the whole plan up front, then execute it.
    #[default]
    Direct,
    /// Interleave reasoning and capability calls until a final answer.
    Stepwise,
}

impl std::str::FromStr for PlannerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "stepwise" => Ok(Self::Stepwise),
            other => Err(ConfigError::ValidationError(format!(
                "unknown planner '{other}' (expected 'direct' or 'stepwise')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    #[serde(default = "default_system_message")]
    pub system_message: String,

    /// Offered as quick replies when a conversation starts
    #[serde(default)]
    pub suggested_questions: Vec<String>,

    #[serde(default)]
    pub planner: PlannerKind,

    /// Token budget for one planning run
    #[serde(default = "default_planner_max_tokens")]
    pub planner_max_tokens: u32,

    /// Upper bound on stepwise planner iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_welcome_message() -> String {
    "Hello and welcome! I can generate images, search documents and the web, \
     look up data, and translate text. Type 'Show languages' to see supported languages."
        .into()
}
fn default_system_message() -> String {
    "You are a helpful assistant. Answer concisely and use the available capabilities when they help."
        .into()
}
fn default_planner_max_tokens() -> u32 {
    128_000
}
fn default_max_iterations() -> u32 {
    10
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            system_message: default_system_message(),
            suggested_questions: vec![],
            planner: PlannerKind::default(),
            planner_max_tokens: default_planner_max_tokens(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl TranslatorConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.endpoint.is_some()
    }
}

impl std::fmt::Debug for TranslatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    /// Semantic ranking profile name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_config: Option<String>,
}

impl SearchConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.index.is_some()
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("index", &self.index)
            .field("semantic_config", &self.semantic_config)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_web_search_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_web_search_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/search".into()
}

impl WebSearchConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_web_search_endpoint(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlConfig {
    /// e.g. `sqlite://data/hr.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.planbot/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `PLANBOT_API_KEY`, then `OPENAI_API_KEY` (only if no key in the file)
    /// - `PLANBOT_PROVIDER`, `PLANBOT_MODEL`, `PLANBOT_PLANNER`
    /// - `TRANSLATOR_API_KEY`, `TRANSLATOR_API_ENDPOINT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
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

    /// Apply overrides from a variable lookup (the process environment in production).
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = var("PLANBOT_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(provider) = var("PLANBOT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = var("PLANBOT_MODEL") {
            self.chat_model = model;
        }
        if let Some(planner) = var("PLANBOT_PLANNER") {
            self.bot.planner = planner.parse()?;
        }
        if let Some(key) = var("TRANSLATOR_API_KEY") {
            self.translator.api_key = Some(key);
        }
        if let Some(endpoint) = var("TRANSLATOR_API_ENDPOINT") {
            self.translator.endpoint = Some(endpoint);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".planbot")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.bot.planner_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "bot.planner_max_tokens must be > 0".into(),
            ));
        }

        if self.bot.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "bot.max_iterations must be > 0".into(),
            ));
        }

        if let Some(code) = self.languages.keys().find(|c| c.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "languages contains an empty code ('{code}')"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            chat_model: default_chat_model(),
            image_model: default_image_model(),
            embedding_model: default_embedding_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            bot: BotConfig::default(),
            translator: TranslatorConfig::default(),
            languages: BTreeMap::new(),
            search: SearchConfig::default(),
            web_search: WebSearchConfig::default(),
            sql: SqlConfig::default(),
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
