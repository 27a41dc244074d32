/*!
 * Provider implementations for different translation services.
 *
 * This module contains the common provider contract and its variants:
 * - Ollama: Local LLM server
 * - Stub: Commercial services whose clients are not implemented yet
 * - Mock: Scripted provider for tests and benchmarks
 */

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{ProviderConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Per-call service settings
///
/// Every field is optional; providers fall back to their own defaults.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Path or blob with service credentials
    pub credentials: Option<String>,
    /// API key for hosted services
    pub api_key: Option<String>,
    /// Model override for LLM-backed services
    pub model: Option<String>,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Cloud project identifier
    pub project_id: Option<String>,
}

/// A single translation request, immutable across retry attempts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslateRequest {
    /// Text to translate
    pub text: String,
    /// Source language code (`auto` lets the service detect it)
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Trailing words of the previous chunk's translation
    pub previous_context: Option<String>,
    /// Required term renderings (source term to target term)
    pub glossary_terms: HashMap<String, String>,
    /// Free-text instructions appended to LLM prompts
    pub instructions: Option<String>,
}

impl TranslateRequest {
    /// Create a request for a language pair
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            ..Default::default()
        }
    }

    /// Attach the sliding-window context
    pub fn previous_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.previous_context = if context.is_empty() { None } else { Some(context) };
        self
    }

    /// Attach glossary terms
    pub fn glossary_terms(mut self, terms: HashMap<String, String>) -> Self {
        self.glossary_terms = terms;
        self
    }

    /// Attach extra prompt instructions
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.instructions = if instructions.is_empty() { None } else { Some(instructions) };
        self
    }
}

/// Outcome of one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    /// Name of the producing service
    pub service_name: String,
    /// Translated text
    pub translated_text: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Free-form metadata such as the model used
    pub metadata: BTreeMap<String, String>,
    /// Wall time of the call
    pub latency: Duration,
    /// Error the service reported alongside an otherwise normal response
    pub error: Option<String>,
}

impl ProviderResult {
    /// Create a successful result
    pub fn new(
        service_name: impl Into<String>,
        translated_text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            translated_text: translated_text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
            latency: Duration::ZERO,
            error: None,
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the measured latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set a service-reported error
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Common trait for all translation providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the orchestrator.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Stable service name used in logs, results and the draft cache
    fn name(&self) -> &str;

    /// Translate one request
    ///
    /// # Arguments
    /// * `config` - Per-call service settings
    /// * `request` - The request to translate
    async fn translate(
        &self,
        config: &ServiceConfig,
        request: &TranslateRequest,
    ) -> Result<ProviderResult, ProviderError>;

    /// Check that the service can be reached
    async fn is_available(&self) -> Result<(), ProviderError>;

    /// Language codes this service accepts
    async fn supported_languages(&self) -> Result<Vec<String>, ProviderError>;
}

/// Build a provider from its configuration entry
pub fn create_provider(config: &ProviderConfig) -> Arc<dyn Provider> {
    create_named_provider(config, config.provider_type.to_lowercase_string())
}

fn create_named_provider(config: &ProviderConfig, name: String) -> Arc<dyn Provider> {
    match config.provider_type {
        TranslationProvider::Ollama => Arc::new(
            ollama::OllamaProvider::new(
                config.endpoint.clone(),
                config.models.clone(),
                Duration::from_secs(config.timeout_secs),
            )
            .with_name(name),
        ),
        other => Arc::new(stub::StubProvider::new(other).with_name(name)),
    }
}

/// Build every configured provider, in configuration order
///
/// Repeated service types are numbered (`ollama`, `ollama#2`, ...) so every
/// provider keeps a distinct name in results and the audit trail.
pub fn create_providers(configs: &[ProviderConfig]) -> Vec<Arc<dyn Provider>> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    configs
        .iter()
        .map(|config| {
            let base = config.provider_type.to_lowercase_string();
            let count = seen.entry(base.clone()).or_default();
            *count += 1;
            let name = if *count == 1 {
                base
            } else {
                format!("{}#{}", base, count)
            };
            create_named_provider(config, name)
        })
        .collect()
}

pub mod mock;
pub mod ollama;
pub mod stub;
