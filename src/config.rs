//! Configuration management for context-forge
//!
//! Settings come from a TOML file (or built-in defaults), then a handful of
//! environment variables override them: `DEBUG`, `TARGET_DIRECTORY` and the
//! API key variable named by `ai.api_key_env`. A `.env` file in the working
//! directory is loaded before any of this runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::openai::{DEFAULT_BASE_URL, DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL};
use crate::ai::retry::RetryPolicy;
use crate::retrieval::SelectionPolicy;

const DEFAULT_SYSTEM_PROMPT: &str = "I'm a code assistant. I answer questions about this \
project using the source files provided as context.";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub ai: AiConfig,
    pub index: IndexConfig,
    pub retrieval: SelectionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Verbose tracing
    pub debug: bool,
    /// Root of the files to index
    pub target_directory: PathBuf,
    /// SQLite file holding the embeddings
    pub database: PathBuf,
    /// Where answered queries are written
    pub responses_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub system_prompt: String,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File extensions to embed, without the dot
    pub extensions: Vec<String>,
    /// File names never embedded
    pub skip_files: Vec<String>,
    pub max_file_size_mb: u32,
    /// Minimum gap between embedding requests
    pub request_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            target_directory: PathBuf::from("."),
            database: PathBuf::from("code_embeddings.db"),
            responses_dir: PathBuf::from("responses"),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            skip_files: vec!["__init__.py".to_string()],
            max_file_size_mb: 10,
            request_interval_ms: 1000,
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("com", "context-forge", "forge")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

/// Load configuration from file or use defaults, then apply the environment
pub fn load_config(custom_path: Option<&str>) -> Result<Config> {
    let path = if let Some(p) = custom_path {
        PathBuf::from(p)
    } else {
        config_path()?
    };

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

impl Config {
    /// Apply `DEBUG` and `TARGET_DIRECTORY` overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = lookup("DEBUG") {
            self.general.debug = is_truthy(&debug);
        }
        if let Some(dir) = lookup("TARGET_DIRECTORY").filter(|d| !d.trim().is_empty()) {
            self.general.target_directory = PathBuf::from(dir);
        }
    }

    /// Whether the API key variable is set
    pub fn has_api_key(&self) -> bool {
        std::env::var(&self.ai.api_key_env)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "t")
}

/// Initialize configuration file with defaults
pub fn init_config() -> Result<()> {
    let path = config_path()?;

    if path.exists() {
        println!("Configuration file already exists at {:?}", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let content = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    println!("Configuration initialized at {:?}", path);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}
