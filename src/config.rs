//! Configuration parsing and validation for algochat.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Root configuration structure.
///
/// Everything except the chat API key is public and is served verbatim by
/// `GET /config`. The key is skipped during serialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors: true,
        }
    }
}

/// Locations of the static data files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// JSON object mapping queries to predefined answers
    #[serde(default = "default_answers_path")]
    pub answers: String,
}

fn default_answers_path() -> String {
    "responses.json".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            answers: default_answers_path(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display and zeroizes on drop.
///
/// Deliberately not `Serialize`. Only accessible via `.expose_secret()`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the chat API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was picked up from the convention env var (holds var name)
    Convention(String),
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
        }
    }
}

/// Chat backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Display name, used in error details ("DeepSeek API error: ...")
    #[serde(default = "default_chat_name")]
    pub name: String,
    /// API key for the inference provider. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub backend: ChatBackendConfig,
}

fn default_chat_name() -> String {
    "DeepSeek".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            name: default_chat_name(),
            api_key: None,
            backend: ChatBackendConfig::default(),
        }
    }
}

/// Which upstream chat protocol to speak.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatBackendConfig {
    /// Raw hosted-inference endpoint taking `{"inputs": ...}`.
    Inference {
        #[serde(default = "default_inference_url")]
        url: String,
    },
    /// OpenAI-compatible `/chat/completions` endpoint.
    Completions {
        #[serde(default = "default_completions_url")]
        url: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
        #[serde(default = "default_temperature")]
        temperature: f64,
        #[serde(default = "default_top_p")]
        top_p: f64,
    },
}

fn default_inference_url() -> String {
    "https://api-inference.huggingface.co/models/meta-llama/Llama-3.2-3B".to_string()
}

fn default_completions_url() -> String {
    "https://router.huggingface.co/together/v1".to_string()
}

fn default_model() -> String {
    "deepseek-ai/DeepSeek-R1".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

impl Default for ChatBackendConfig {
    fn default() -> Self {
        ChatBackendConfig::Completions {
            url: default_completions_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl ChatBackendConfig {
    pub fn url(&self) -> &str {
        match self {
            ChatBackendConfig::Inference { url } => url,
            ChatBackendConfig::Completions { url, .. } => url,
        }
    }
}

/// Block explorer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplorerConfig {
    /// Base URL of the explorer REST API
    #[serde(default = "default_explorer_url")]
    pub url: String,
}

fn default_explorer_url() -> String {
    "https://algoexplorerapi.io/v2".to_string()
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            url: default_explorer_url(),
        }
    }
}

/// Limits applied to every outbound call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Total time allowed for one upstream request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Maximum number of upstream requests in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    32
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, without resolving the API key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read_config_file(path.as_ref())?;
        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string, without resolving the API key.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.backend.url().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Chat backend '{}' has empty URL",
                self.chat.name
            )));
        }

        if self.explorer.url.is_empty() {
            return Err(ConfigError::Validation(
                "Explorer has empty URL".to_string(),
            ));
        }

        if self.upstream.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "upstream.max_concurrent must be at least 1".to_string(),
            ));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The resolved chat API key.
    ///
    /// Always present after [`Config::resolve_api_key`] succeeds.
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.chat.api_key.as_ref()
    }

    /// Resolve the chat API key in place.
    ///
    /// - If `api_key` contains `${VAR}`: expand from environment, source = `EnvExpanded`
    /// - If `api_key` is a literal string: keep it, source = `Literal`
    /// - If `api_key` is absent: try the convention variable
    ///   (`<NAME>_API_KEY`), source = `Convention(var_name)`
    ///
    /// Fails when no non-empty key can be found.
    pub fn resolve_api_key(mut self) -> Result<(Self, KeySource), ConfigError> {
        let source = self.resolve_api_key_with(|name| std::env::var(name).ok())?;
        Ok((self, source))
    }

    fn resolve_api_key_with<F>(&mut self, lookup: F) -> Result<KeySource, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let convention_var = convention_env_var_name(&self.chat.name);

        let (key, source) = match self.chat.api_key.take() {
            Some(raw) if raw.expose_secret().contains("${") => {
                let expanded = expand_env_vars_with(raw.expose_secret(), &lookup)?;
                (Some(expanded), KeySource::EnvExpanded)
            }
            Some(raw) => (Some(raw.expose_secret().to_string()), KeySource::Literal),
            None => (
                lookup(&convention_var),
                KeySource::Convention(convention_var.clone()),
            ),
        };

        match key {
            Some(key) if !key.trim().is_empty() => {
                self.chat.api_key = Some(ApiKey::from(key));
                Ok(source)
            }
            _ => Err(ConfigError::MissingApiKey {
                name: self.chat.name.clone(),
                var: convention_var,
            }),
        }
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse answers file '{path}': {source}")]
    Answers {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}': {message}")]
    EnvVar { var: String, message: String },

    #[error("API key for '{name}' is missing: set chat.api_key or the {var} environment variable")]
    MissingApiKey { name: String, var: String },
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string. Fails on first missing variable,
/// unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        // The input is a secret; keep it out of error messages.
        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            message: "Unclosed '${' in chat.api_key".to_string(),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            message: "not set (referenced in chat.api_key)".to_string(),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Derive the convention-based env var name for a chat backend.
///
/// - "DeepSeek" -> "DEEPSEEK_API_KEY"
/// - "hugging-face" -> "HUGGING_FACE_API_KEY"
pub fn convention_env_var_name(name: &str) -> String {
    let upper_snake = name.to_uppercase().replace(['-', ' '], "_");
    format!("{}_API_KEY", upper_snake)
}
