use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::language_utils;
use crate::translation::orchestrator::OrchestratorConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO, or `auto`)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Retry, timeout and validation policy for provider calls
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Providers queried concurrently for every chunk
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Translation memory settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Chunking settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Minimum similarity for fuzzy memory hits (0 disables fuzzy lookup)
    #[serde(default)]
    pub fuzzy_threshold: f64,

    /// Whether glossary terms are injected into requests
    #[serde(default = "default_true")]
    pub use_glossary: bool,

    /// Optional literary refinement pass
    #[serde(default)]
    pub refiner: Option<RefinerConfig>,

    /// Extra instructions appended to LLM prompts
    #[serde(default)]
    pub instructions: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Amazon Translate (client not implemented)
    Amazon,
    /// IBM Watson Language Translator (client not implemented)
    Ibm,
    /// Doclingo (client not implemented)
    Doclingo,
}

impl TranslationProvider {
    /// Human-readable service name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Amazon => "Amazon Translate",
            Self::Ibm => "IBM Watson Translate",
            Self::Doclingo => "Doclingo",
        }
    }

    /// Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::Amazon => "amazon".to_string(),
            Self::Ibm => "ibm".to_string(),
            Self::Doclingo => "doclingo".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "amazon" => Ok(Self::Amazon),
            "ibm" => Ok(Self::Ibm),
            "doclingo" => Ok(Self::Doclingo),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// One configured provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: TranslationProvider,

    /// Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Models to rotate through (LLM providers only)
    #[serde(default)]
    pub models: Vec<String>,

    /// HTTP timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Provider config with defaults for its type
    pub fn new(provider_type: TranslationProvider) -> Self {
        let endpoint = match provider_type {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            _ => String::new(),
        };

        Self {
            provider_type,
            endpoint,
            models: Vec::new(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Orchestrator settings as they appear in the config file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Per-attempt deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Successful providers required per chunk
    #[serde(default = "default_min_successes")]
    pub min_successes: usize,

    /// Attempts per provider (first call included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base back-off between attempts, doubled after each retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Check that output is written in the target language
    #[serde(default = "default_true")]
    pub validate_language: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            min_successes: default_min_successes(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            validate_language: true,
        }
    }
}

impl OrchestratorSettings {
    /// Runtime orchestrator configuration
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            min_successes: self.min_successes,
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            validate_language: self.validate_language,
        }
    }
}

/// Translation memory settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Whether the memory is consulted and written
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database path; defaults to the user data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: None,
        }
    }
}

/// Chunking settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters (0 = unlimited)
    #[serde(default)]
    pub chunk_size: usize,

    /// Trailing words carried into the next chunk's request
    #[serde(default = "default_context_words")]
    pub context_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 0,
            context_words: default_context_words(),
        }
    }
}

/// Literary refinement settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RefinerConfig {
    /// Ollama model used for refinement
    pub model: String,

    /// Ollama endpoint
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_min_successes() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500 // doubled on each retry
}

fn default_context_words() -> usize {
    crate::translation::chunker::DEFAULT_CONTEXT_WORDS
}

fn default_true() -> bool {
    true
}

fn default_ollama_endpoint() -> String {
    crate::providers::ollama::DEFAULT_ENDPOINT.to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::new(TranslationProvider::Ollama)]
}

fn validate_endpoint(endpoint: &str, what: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Ok(());
    }
    url::Url::parse(endpoint).with_context(|| format!("Invalid {} endpoint: {}", what, endpoint))?;
    Ok(())
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::validate_source_language(&self.source_language)?;
        language_utils::validate_language_code(&self.target_language)?;

        if self.providers.is_empty() {
            return Err(anyhow!("At least one translation provider must be configured"));
        }

        for provider in &self.providers {
            validate_endpoint(&provider.endpoint, &provider.provider_type.to_lowercase_string())?;
        }

        if self.orchestrator.max_attempts == 0 {
            return Err(anyhow!("orchestrator.max_attempts must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(anyhow!(
                "fuzzy_threshold must be between 0 and 1, got {}",
                self.fuzzy_threshold
            ));
        }

        if let Some(refiner) = &self.refiner {
            if refiner.model.trim().is_empty() {
                return Err(anyhow!("refiner.model must not be empty"));
            }
            validate_endpoint(&refiner.endpoint, "refiner")?;
        }

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Write configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "uk".to_string(),
            orchestrator: OrchestratorSettings::default(),
            providers: default_providers(),
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            fuzzy_threshold: 0.0,
            use_glossary: true,
            refiner: None,
            instructions: None,
            log_level: LogLevel::default(),
        }
    }
}
