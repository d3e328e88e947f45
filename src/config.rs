//! Configuration parsing and validation.
//!
//! repodoc is configured with a TOML file (default `./config/repodoc.toml`).
//! Every section is optional and falls back to the defaults below, so an
//! empty file is a valid configuration that runs analysis and chunking
//! with both external services disabled.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/repodoc.sqlite"
//!
//! [chunking]
//! chunk_size = 800
//! overlap = 100
//!
//! [embedding]
//! provider = "openai"            # "disabled" | "openai" | "ollama" | "local"
//! model = "text-embedding-3-small"
//! dims = 1536
//! batch_size = 32
//!
//! [llm]
//! provider = "openai"            # "disabled" | "openai" | "ollama" | "cohere"
//! model = "gpt-4o-mini"
//! max_tokens = 4096
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//! jitter = 0.1
//!
//! [retrieval]
//! top_k = 5
//! ```
//!
//! OpenAI-compatible services other than OpenAI (Jina, Together, a local
//! gateway) are reached by setting `url` and `api_key_env`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use repodoc_core::chunk::Chunker;
use repodoc_core::generation::GenerationParams;

use crate::loader::{self, LoaderOptions};
use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/repodoc.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Extra glob patterns, matched against repository-relative paths.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Where remote repositories are cloned. Defaults to `.repo-cache`
    /// next to the database file.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_extensions: default_include_extensions(),
            exclude_extensions: Vec::new(),
            exclude_dirs: default_exclude_dirs(),
            exclude_globs: Vec::new(),
            max_file_size: default_max_file_size(),
            follow_symlinks: false,
            cache_dir: None,
        }
    }
}

fn default_include_extensions() -> Vec<String> {
    loader::DEFAULT_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_exclude_dirs() -> Vec<String> {
    loader::DEFAULT_EXCLUDE_DIRS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_file_size() -> u64 {
    500_000
}

impl LoaderConfig {
    pub fn options(&self) -> LoaderOptions {
        LoaderOptions {
            include_extensions: self.include_extensions.clone(),
            exclude_extensions: self.exclude_extensions.clone(),
            exclude_dirs: self.exclude_dirs.clone(),
            exclude_globs: self.exclude_globs.clone(),
            max_file_size: self.max_file_size,
            follow_symlinks: self.follow_symlinks,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override, e.g. `https://api.jina.ai/v1` or
    /// `http://localhost:11434`.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults to
    /// `OPENAI_API_KEY` for the openai provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Fraction of each delay randomized, in `[0.0, 1.0]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_jitter() -> f64 {
    0.1
}

impl RetryConfig {
    /// Policy for calls that time out after `timeout_secs`.
    pub fn policy(&self, timeout_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            call_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

impl Config {
    /// All defaults: both services disabled.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.chunking.chunk_size, self.chunking.overlap)
            .map_err(|e| anyhow::anyhow!("chunking: {}", e))
    }

    /// Directory for cloned remote repositories.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.loader.cache_dir {
            Some(dir) => dir.clone(),
            None => self
                .db
                .path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(".repo-cache"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker()?;

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retry.max_attempts < 1 {
            bail!("retry.max_attempts must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            bail!("retry.jitter must be in [0.0, 1.0]");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if matches!(self.embedding.provider.as_str(), "openai" | "ollama") {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }

        match self.llm.provider.as_str() {
            "disabled" | "openai" | "ollama" | "cohere" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled, openai, ollama, or cohere.",
                other
            ),
        }
        if self.llm.is_enabled() && self.llm.model.is_none() {
            bail!(
                "llm.model must be specified when provider is '{}'",
                self.llm.provider
            );
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be > 0");
        }

        if self.loader.max_file_size == 0 {
            bail!("loader.max_file_size must be > 0");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.loader.max_file_size, 500_000);
        assert!(!config.embedding.is_enabled());
        assert!(!config.llm.is_enabled());
        assert!(config.loader.exclude_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_http_embedding_requires_model_and_dims() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        )
        .is_ok());
        assert!(parse_config("[embedding]\nprovider = \"local\"\n").is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse_config("[embedding]\nprovider = \"qdrant\"\n").is_err());
        assert!(parse_config("[llm]\nprovider = \"hal\"\nmodel = \"9000\"\n").is_err());
        assert!(parse_config("[llm]\nprovider = \"cohere\"\n").is_err());
    }

    #[test]
    fn test_retry_bounds() {
        assert!(parse_config("[retry]\nmax_attempts = 0\n").is_err());
        assert!(parse_config("[retry]\njitter = 1.5\n").is_err());
        assert!(parse_config("[retry]\nbase_delay_ms = 5000\nmax_delay_ms = 10\n").is_err());
    }

    #[test]
    fn test_cache_dir_defaults_next_to_db() {
        let config = parse_config("[db]\npath = \"/tmp/x/repodoc.sqlite\"\n").unwrap();
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/x/.repo-cache"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = load_or_default(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/repodoc.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.loader.exclude_extensions, vec![".lock"]);
    }
}
