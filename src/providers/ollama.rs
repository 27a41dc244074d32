/*!
 * Ollama-backed translation provider and refiner.
 *
 * Both talk to the `/api/generate` endpoint of a local Ollama server with
 * non-streaming requests. The provider rotates through its configured models
 * so repeated runs spread load (and style) across them.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ProviderError;
use crate::language_utils;
use crate::providers::{Provider, ProviderResult, ServiceConfig, TranslateRequest};
use crate::translation::review::Refiner;

/// Default Ollama endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Models used when none are configured
pub const DEFAULT_MODELS: &[&str] = &["llama3.2", "gemma2:2b", "qwen2.5:3b", "mistral:7b", "phi4:14b"];

/// Confidence attached to every Ollama translation
const OLLAMA_CONFIDENCE: f64 = 0.7;

/// HTTP timeout of the refiner client
const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Languages the default models translate reliably
const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko", "ar", "uk"];

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Whether to stream the response
    stream: bool,
}

impl GenerationRequest {
    /// Create a non-streaming request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

/// Thin HTTP client shared by the provider and the refiner
#[derive(Debug, Clone)]
struct OllamaClient {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl OllamaClient {
    fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };

        Self {
            base_url,
            timeout,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, message));
        }

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    async fn tags(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(map_status_error(status, "Ollama not available".to_string()))
        }
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

fn map_status_error(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

/// Translation provider backed by a local Ollama server
#[derive(Debug)]
pub struct OllamaProvider {
    name: String,
    client: OllamaClient,
    models: Vec<String>,
    next_model: AtomicUsize,
}

impl OllamaProvider {
    /// Create a provider; an empty model list falls back to [`DEFAULT_MODELS`]
    pub fn new(endpoint: impl Into<String>, models: Vec<String>, timeout: Duration) -> Self {
        let models = if models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            models
        };

        Self {
            name: "ollama".to_string(),
            client: OllamaClient::new(endpoint, timeout),
            models,
            next_model: AtomicUsize::new(0),
        }
    }

    /// Report results under a different service name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configured models, in rotation order
    pub fn models(&self) -> &[String] {
        &self.models
    }

    fn pick_model(&self) -> String {
        let index = self.next_model.fetch_add(1, Ordering::Relaxed) % self.models.len();
        self.models[index].clone()
    }
}

/// Build the translation prompt, with optional instruction, glossary and context sections
pub fn build_translation_prompt(request: &TranslateRequest) -> String {
    let source_lang = if request.source_lang.is_empty() || language_utils::is_auto_detect(&request.source_lang) {
        "detect"
    } else {
        request.source_lang.as_str()
    };

    let mut prompt = format!(
        "Translate the following text from {} to {}.\nOnly respond with the translation, nothing else.",
        source_lang, request.target_lang
    );

    if let Some(instructions) = &request.instructions {
        prompt.push_str("\n\nADDITIONAL INSTRUCTIONS:\n");
        prompt.push_str(instructions);
    }

    if !request.glossary_terms.is_empty() {
        let mut terms: Vec<_> = request.glossary_terms.iter().collect();
        terms.sort();
        prompt.push_str("\n\nGLOSSARY (always use these translations):");
        for (source, target) in terms {
            prompt.push_str(&format!("\n- {} => {}", source, target));
        }
    }

    if let Some(context) = &request.previous_context {
        prompt.push_str("\n\nCONTEXT (end of the previous passage, do not translate it again):\n...");
        prompt.push_str(context);
    }

    prompt.push_str(&format!("\n\nText: \"{}\"\n\nTranslation:", request.text));
    prompt
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        config: &ServiceConfig,
        request: &TranslateRequest,
    ) -> Result<ProviderResult, ProviderError> {
        let start = Instant::now();
        let model = config.model.clone().unwrap_or_else(|| self.pick_model());
        let client = match &config.base_url {
            Some(url) => OllamaClient::new(url.clone(), self.client.timeout),
            None => self.client.clone(),
        };

        debug!("Ollama translating {} chars with model {}", request.text.chars().count(), model);

        let generation = GenerationRequest::new(model.clone(), build_translation_prompt(request));
        let response = client.generate(&generation).await?;

        Ok(ProviderResult::new(self.name(), response.response.trim(), OLLAMA_CONFIDENCE)
            .with_metadata("model", model)
            .with_latency(start.elapsed()))
    }

    async fn is_available(&self) -> Result<(), ProviderError> {
        self.client.tags().await
    }

    async fn supported_languages(&self) -> Result<Vec<String>, ProviderError> {
        Ok(SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect())
    }
}

/// Literary refinement pass backed by an Ollama model
#[derive(Debug)]
pub struct OllamaRefiner {
    client: OllamaClient,
    model: String,
}

impl OllamaRefiner {
    /// Create a refiner for one model
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OllamaClient::new(endpoint, DEFAULT_CLIENT_TIMEOUT),
            model: model.into(),
        }
    }
}

/// Build the literary-editor prompt used by [`OllamaRefiner`]
pub fn build_refinement_prompt(
    source_lang: &str,
    target_lang: &str,
    source_text: &str,
    draft_text: &str,
) -> String {
    format!(
        r#"You are an experienced {target} literary editor.

Below is a DRAFT {target} translation. Rewrite it so it reads as natural, idiomatic {target} prose.

ORIGINAL ({source}):
{source_text}

DRAFT TRANSLATION ({target}):
{draft_text}

Keep the meaning, names and technical terms exactly as they are.
Prefer natural word order and varied vocabulary over literal phrasing.
If the draft already reads well, return it unchanged.

Output ONLY the refined {target} translation, without any explanation."#,
        target = target_lang,
        source = source_lang,
        source_text = source_text,
        draft_text = draft_text,
    )
}

#[async_trait]
impl Refiner for OllamaRefiner {
    async fn refine(
        &self,
        source_lang: &str,
        target_lang: &str,
        source_text: &str,
        draft_text: &str,
    ) -> Result<String> {
        let prompt = build_refinement_prompt(source_lang, target_lang, source_text, draft_text);
        let response = self
            .client
            .generate(&GenerationRequest::new(self.model.clone(), prompt))
            .await
            .map_err(|e| anyhow!(e))
            .context("Refinement request failed")?;

        let refined = response.response.trim();
        if refined.is_empty() {
            warn!("Refiner returned an empty response, keeping the draft");
            return Ok(draft_text.to_string());
        }
        Ok(refined.to_string())
    }
}
