use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::paths::AppPaths;
use super::validation::validate_settings;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Environment variables that override the YAML file, as `(variable, section, key)`.
const ENV_OVERRIDES: [(&str, &str, &str); 7] = [
    ("ANTHROPIC_API_KEY", "anthropic", "api_key"),
    ("ANTHROPIC_MODEL", "anthropic", "model"),
    ("ANTHROPIC_BASE_URL", "anthropic", "base_url"),
    ("EMBEDDING_PROVIDER", "embedding", "provider"),
    ("EMBEDDING_MODEL", "embedding", "model"),
    ("HOST", "server", "host"),
    ("PORT", "server", "port"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub anthropic: AnthropicSettings,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
}

impl Settings {
    /// JSON rendering with secrets masked, for logs.
    pub fn redacted(&self) -> Value {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        redact_sensitive_values(&value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_rounds: usize,
    pub timeout_secs: u64,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 800,
            temperature: 0.0,
            max_tool_rounds: 2,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX model, requires the `fastembed` cargo feature.
    Fastembed,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Http,
    /// Deterministic hashed bag of words, no model download.
    Hash,
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        if cfg!(feature = "fastembed") {
            EmbeddingProvider::Fastembed
        } else {
            EmbeddingProvider::Hash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Request timeout for the http provider.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            base_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_results: usize,
    pub max_history: usize,
    /// Minimum cosine similarity for a fuzzy course-name match.
    pub course_match_threshold: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            course_match_threshold: 0.35,
        }
    }
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("COURSE_RAG_CONFIG") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    /// Loads `config.yml`, applies environment overrides and validates the result.
    pub fn load(&self) -> Result<Settings, ApiError> {
        let file_config = load_yaml_file(&self.config_path())?;
        let overrides = env_overrides(|key| env::var(key).ok())?;
        settings_from_value(&deep_merge(&file_config, &overrides))
    }
}

pub fn settings_from_value(value: &Value) -> Result<Settings, ApiError> {
    let settings: Settings = serde_json::from_value(value.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid configuration: {}", e)))?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        ApiError::BadRequest(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::BadRequest(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn env_overrides<F>(lookup: F) -> Result<Value, ApiError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut root = Map::new();

    for (var, section, key) in ENV_OVERRIDES {
        let Some(raw) = lookup(var).map(|v| v.trim().to_string()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        let value = if var == "PORT" {
            let port = raw
                .parse::<u16>()
                .map_err(|_| ApiError::BadRequest(format!("PORT is not a valid port: {}", raw)))?;
            json!(port)
        } else {
            Value::String(raw)
        };

        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }

    Ok(Value::Object(root))
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                let has_secret = match val {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    _ => true,
                };
                if is_sensitive_key(key) && has_secret {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
