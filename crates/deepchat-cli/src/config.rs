use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where tokens come from: an OpenAI-compatible streaming endpoint
/// (llama.cpp, ollama, vllm, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Path to the threads JSON file (supports ~, $VAR).
    #[serde(default)]
    pub threads: Option<String>,
}

impl Config {
    /// Layer defaults, the TOML file, and DEEPCHAT_* env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(&path));
        }
        figment
            .merge(Env::prefixed("DEEPCHAT_").split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.display()))
    }

    /// Resolved location of the threads file.
    pub fn threads_path(&self) -> PathBuf {
        match &self.storage.threads {
            Some(raw) => expand_path(raw),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("deepchat")
                .join("threads.json"),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deepchat")
        .join("config.toml")
}

/// Expand environment variables in a path string.
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result == "~" || result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    }

    while let Some(start) = result.find('$') {
        let rest = &result[start + 1..];
        let (name, end) = if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(close) => (&stripped[..close], start + close + 3),
                None => break,
            }
        } else {
            let len = rest
                .find(|c: char| !c.is_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            if len == 0 {
                break;
            }
            (&rest[..len], start + 1 + len)
        };

        let value = std::env::var(name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[end..]);
    }

    PathBuf::from(result)
}
