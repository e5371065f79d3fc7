use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rag::MemoryMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Policy status dataset served by the `policy_status` function
    #[serde(default = "default_policies")]
    pub policies: BTreeMap<String, String>,
}

/// Which embedding function backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hashing,
    Ollama,
    Candle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub url: String,
    pub chat_model: String,
    pub embedding: EmbeddingBackend,
    pub embedding_model: String,
    pub hashing_dimension: usize,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            chat_model: "qwen2.5:7b-instruct".to_string(),
            embedding: EmbeddingBackend::Hashing,
            embedding_model: "nomic-embed-text".to_string(),
            hashing_dimension: 256,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub min_chunk_chars: usize,
    pub overlap_tokens: usize,
    pub max_chunks: usize,
    /// HuggingFace `tokenizer.json`; whitespace tokens when unset
    pub tokenizer: Option<PathBuf>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            min_chunk_chars: 350,
            overlap_tokens: 0,
            max_chunks: 10_000,
            tokenizer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub memory_mode: MemoryMode,
    pub instructions: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            similarity_threshold: 0.0,
            memory_mode: MemoryMode::Messages,
            instructions: "You are a helpful assistant. Answer the user's question accurately and concisely."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_ms: u64,
    pub max_parallel: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_parallel: 4,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { history_limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragbuddy")
            .join("store.json");
        Self { path }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub version: i64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { version: 1 }
    }
}

fn default_policies() -> BTreeMap<String, String> {
    [("H001", "pending"), ("H002", "approved"), ("H003", "rejected")]
        .into_iter()
        .map(|(id, status)| (id.to_string(), status.to_string()))
        .collect()
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".ragbuddy").join("config.toml"))
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunker.max_tokens == 0 {
            bail!("chunker.max_tokens must be at least 1");
        }
        if self.chunker.overlap_tokens >= self.chunker.max_tokens {
            bail!("chunker.overlap_tokens must be smaller than chunker.max_tokens");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.tools.max_parallel == 0 {
            bail!("tools.max_parallel must be at least 1");
        }
        if self.model.hashing_dimension == 0 {
            bail!("model.hashing_dimension must be at least 1");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: ModelConfig::default(),
            chunker: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            store: StoreConfig::default(),
            ingestion: IngestionConfig::default(),
            policies: default_policies(),
        }
    }
}
