/*!
 * End-to-end translation of one text.
 *
 * The pipeline consults the translation memory, splits the text into
 * chunks and translates them strictly in order. Each chunk goes through the
 * orchestrator, an optional arbiter and an optional refiner; the tail of its
 * translation becomes the context of the next chunk. Store failures are
 * logged and never abort a translation.
 */

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::database::Repository;
use crate::errors::{AppError, TranslationError};
use crate::language_utils;
use crate::providers::ollama::OllamaRefiner;
use crate::providers::{self, ProviderResult, ServiceConfig, TranslateRequest};
use crate::translation::chunker::{self, DEFAULT_CONTEXT_WORDS};
use crate::translation::orchestrator::Orchestrator;
use crate::translation::review::{Arbiter, Evaluation, Refiner};
use crate::translation::validator::LanguageDetector;

/// Separator between translated chunks
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Knobs of the pipeline that are not orchestrator policy
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Maximum chunk length in characters (0 = unlimited)
    pub chunk_size: usize,
    /// Words of context carried between chunks
    pub context_words: usize,
    /// Minimum similarity for fuzzy memory hits (0 disables)
    pub fuzzy_threshold: f64,
    /// Inject glossary terms into requests
    pub use_glossary: bool,
    /// Extra prompt instructions
    pub instructions: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: 0,
            context_words: DEFAULT_CONTEXT_WORDS,
            fuzzy_threshold: 0.0,
            use_glossary: true,
            instructions: None,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            context_words: config.chunking.context_words,
            fuzzy_threshold: config.fuzzy_threshold,
            use_glossary: config.use_glossary,
            instructions: config.instructions.clone(),
        }
    }
}

/// Where a translation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOrigin {
    /// Exact translation memory hit
    Memory,
    /// Fuzzy translation memory hit
    FuzzyMemory,
    /// Fresh provider output
    Providers,
}

/// Translated text of one call to [`TranslationPipeline::translate`]
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Final text
    pub text: String,
    /// Origin of the text as a whole
    pub origin: TranslationOrigin,
    /// Number of chunks the input was split into
    pub chunks: usize,
}

/// Translation of a single chunk or cell
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTranslation {
    /// Final (possibly refined) text
    pub text: String,
    /// Service credited with the text
    pub selected_service: String,
    /// Whether the text came from the translation memory
    pub from_memory: bool,
}

/// Store, orchestrator and reviewers composed into one translation flow
pub struct TranslationPipeline {
    orchestrator: Orchestrator,
    options: PipelineOptions,
    service_config: ServiceConfig,
    store: Option<Repository>,
    arbiter: Option<Arc<dyn Arbiter>>,
    refiner: Option<Arc<dyn Refiner>>,
}

impl TranslationPipeline {
    /// Create a pipeline without store or reviewers
    pub fn new(orchestrator: Orchestrator, options: PipelineOptions) -> Self {
        Self {
            orchestrator,
            options,
            service_config: ServiceConfig::default(),
            store: None,
            arbiter: None,
            refiner: None,
        }
    }

    /// Build the pipeline described by a configuration
    pub fn from_config(config: &Config, store: Option<Repository>) -> Result<Self, AppError> {
        let providers = providers::create_providers(&config.providers);
        let orchestrator =
            Orchestrator::new(providers, config.orchestrator.to_orchestrator_config())?;

        let mut pipeline = Self::new(orchestrator, PipelineOptions::from(config));
        if let Some(store) = store {
            pipeline = pipeline.with_store(store);
        }
        if let Some(refiner) = &config.refiner {
            info!("Literary refinement enabled with model {}", refiner.model);
            pipeline = pipeline.with_refiner(Arc::new(OllamaRefiner::new(
                refiner.endpoint.clone(),
                refiner.model.clone(),
            )));
        }
        Ok(pipeline)
    }

    /// Attach the translation memory
    pub fn with_store(mut self, store: Repository) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an arbiter used when several providers succeed
    pub fn with_arbiter(mut self, arbiter: Arc<dyn Arbiter>) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Attach a refiner run over every draft
    pub fn with_refiner(mut self, refiner: Arc<dyn Refiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Per-call service settings handed to providers
    pub fn with_service_config(mut self, service_config: ServiceConfig) -> Self {
        self.service_config = service_config;
        self
    }

    /// Translation memory, when attached
    pub fn store(&self) -> Option<&Repository> {
        self.store.as_ref()
    }

    /// Pipeline options
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Translate a whole text
    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, TranslationError> {
        if let Some(store) = &self.store {
            match store.get_cached(text, source_lang, target_lang).await {
                Ok(Some(cached)) => {
                    info!("Using cached translation");
                    return Ok(PipelineOutput {
                        text: cached,
                        origin: TranslationOrigin::Memory,
                        chunks: 0,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Translation memory lookup failed: {:#}", e),
            }

            if self.options.fuzzy_threshold > 0.0 {
                match store
                    .fuzzy_get_cached(text, source_lang, target_lang, self.options.fuzzy_threshold)
                    .await
                {
                    Ok(Some(cached)) => {
                        info!("Using fuzzy-matched cached translation");
                        return Ok(PipelineOutput {
                            text: cached,
                            origin: TranslationOrigin::FuzzyMemory,
                            chunks: 0,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Fuzzy lookup failed: {:#}", e),
                }
            }
        }

        let glossary = self.load_glossary(source_lang, target_lang).await;
        let chunks = chunker::chunk(text, self.options.chunk_size);
        if chunks.len() > 1 {
            info!(
                "Splitting into {} chunks (max {} chars each)",
                chunks.len(),
                self.options.chunk_size
            );
        }

        let mut translated = Vec::with_capacity(chunks.len());
        let mut previous_context = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }
            if chunks.len() > 1 {
                info!("Translating chunk {}/{}...", i + 1, chunks.len());
            }

            let segment = self
                .translate_segment(
                    chunk,
                    source_lang,
                    target_lang,
                    &previous_context,
                    &glossary,
                    i + 1,
                    cancel,
                )
                .await?;

            previous_context = chunker::extract_context(&segment.text, self.options.context_words);
            translated.push(segment.text);
        }

        Ok(PipelineOutput {
            text: translated.join(CHUNK_SEPARATOR),
            origin: TranslationOrigin::Providers,
            chunks: chunks.len(),
        })
    }

    /// Glossary for a language pair, or an empty map when disabled or failing
    pub async fn load_glossary(&self, source_lang: &str, target_lang: &str) -> HashMap<String, String> {
        let Some(store) = self.store.as_ref().filter(|_| self.options.use_glossary) else {
            return HashMap::new();
        };

        match store.get_glossary_terms(source_lang, target_lang).await {
            Ok(terms) => {
                if !terms.is_empty() {
                    info!("Loaded {} glossary terms", terms.len());
                }
                terms
            }
            Err(e) => {
                warn!("Failed to load glossary: {:#}", e);
                HashMap::new()
            }
        }
    }

    /// Translate one chunk or cell
    ///
    /// `number` is the one-based position used in error reports.
    #[allow(clippy::too_many_arguments)]
    pub async fn translate_segment(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        previous_context: &str,
        glossary: &HashMap<String, String>,
        number: usize,
        cancel: &CancellationToken,
    ) -> Result<SegmentTranslation, TranslationError> {
        if let Some(store) = &self.store {
            match store.get_cached(text, source_lang, target_lang).await {
                Ok(Some(cached)) => {
                    debug!("Segment {} served from translation memory", number);
                    return Ok(SegmentTranslation {
                        text: cached,
                        selected_service: String::new(),
                        from_memory: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Translation memory lookup failed: {:#}", e),
            }
        }

        if let Some(refiner) = &self.refiner {
            if let Some((service, draft)) = self.reusable_draft(text, source_lang, target_lang).await {
                info!("Reusing stage-1 draft from {} (segment {})", service, number);
                let final_text = self
                    .refine(refiner.as_ref(), text, source_lang, target_lang, &draft)
                    .await;
                self.persist_memory(text, source_lang, target_lang, &final_text, &draft, &service)
                    .await;
                return Ok(SegmentTranslation {
                    text: final_text,
                    selected_service: service,
                    from_memory: false,
                });
            }
        }

        let mut request = TranslateRequest::new(text, source_lang, target_lang)
            .previous_context(previous_context)
            .glossary_terms(glossary.clone());
        if let Some(instructions) = &self.options.instructions {
            request = request.instructions(instructions.clone());
        }

        let outcome = self
            .orchestrator
            .execute(&self.service_config, &request, cancel)
            .await;

        let min_successes = self.orchestrator.config().min_successes;
        let Some(first) = outcome.first().filter(|_| outcome.meets_minimum(min_successes)) else {
            if outcome.errors.iter().any(|e| matches!(e, TranslationError::Cancelled)) {
                return Err(TranslationError::Cancelled);
            }
            return Err(TranslationError::AllProvidersFailed {
                chunk: number,
                errors: outcome.error_messages(),
            });
        };
        let first = first.clone();

        let evaluation = self
            .arbitrate(text, source_lang, target_lang, &outcome.results)
            .await;

        let final_text = match &self.refiner {
            Some(refiner) => {
                self.refine(
                    refiner.as_ref(),
                    text,
                    source_lang,
                    target_lang,
                    &evaluation.composite_text,
                )
                .await
            }
            None => evaluation.composite_text.clone(),
        };

        self.persist(
            text,
            source_lang,
            target_lang,
            &outcome.results,
            &first,
            &evaluation,
            &final_text,
        )
        .await;

        Ok(SegmentTranslation {
            text: final_text,
            selected_service: evaluation.selected_service,
            from_memory: false,
        })
    }

    /// Draft from an earlier run, checked per provider in configuration order
    async fn reusable_draft(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Option<(String, String)> {
        let store = self.store.as_ref()?;
        for service in self.orchestrator.provider_names() {
            match store
                .get_stage1_draft(text, source_lang, target_lang, &service)
                .await
            {
                Ok(Some(draft)) => return Some((service, draft)),
                Ok(None) => {}
                Err(e) => {
                    warn!("Stage-1 draft lookup failed: {:#}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn arbitrate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        results: &[ProviderResult],
    ) -> Evaluation {
        // Callers guarantee at least one result
        let fallback = || Evaluation::select(&results[0]);

        let Some(arbiter) = self.arbiter.as_ref().filter(|_| results.len() > 1) else {
            return fallback();
        };

        match arbiter.evaluate(text, source_lang, target_lang, results).await {
            Ok(evaluation) => {
                info!("Arbiter selected: {}", evaluation.selected_service);
                evaluation
            }
            Err(e) => {
                warn!("Arbiter failed: {:#}, using first result", e);
                fallback()
            }
        }
    }

    async fn refine(
        &self,
        refiner: &dyn Refiner,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        draft: &str,
    ) -> String {
        match refiner.refine(source_lang, target_lang, text, draft).await {
            Ok(refined) => refined,
            Err(e) => {
                warn!("Refiner failed: {:#}, using draft", e);
                draft.to_string()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        results: &[ProviderResult],
        first: &ProviderResult,
        evaluation: &Evaluation,
        final_text: &str,
    ) {
        let Some(store) = &self.store else {
            return;
        };

        match store.save_request(text, source_lang, target_lang).await {
            Ok(request_id) => {
                for result in results {
                    if let Err(e) = store.save_result(&request_id, result).await {
                        warn!("Failed to record provider result: {:#}", e);
                    }
                }
                let reasoning = Some(evaluation.reasoning.as_str()).filter(|r| !r.is_empty());
                if let Err(e) = store
                    .save_final_translation(
                        &request_id,
                        &evaluation.selected_service,
                        final_text,
                        evaluation.is_composite,
                        reasoning,
                    )
                    .await
                {
                    warn!("Failed to record final translation: {:#}", e);
                }
            }
            Err(e) => warn!("Failed to record translation request: {:#}", e),
        }

        // The draft of record is the first provider's raw output
        self.persist_memory(
            text,
            source_lang,
            target_lang,
            final_text,
            &first.translated_text,
            &evaluation.selected_service,
        )
        .await;

        if self.refiner.is_some() {
            if let Err(e) = store
                .save_to_stage1_cache(
                    text,
                    source_lang,
                    target_lang,
                    &first.translated_text,
                    &first.service_name,
                )
                .await
            {
                warn!("Failed to save stage-1 draft: {:#}", e);
            }
        }
    }

    async fn persist_memory(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        final_text: &str,
        draft: &str,
        service: &str,
    ) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store
            .save_to_memory(text, source_lang, target_lang, final_text, Some(draft), service)
            .await
        {
            warn!("Failed to save translation memory: {:#}", e);
        }
    }
}

/// Resolve an `auto` source language from a text sample
///
/// Returns the code unchanged when it is not `auto` or detection is inconclusive.
pub fn resolve_source_language(
    source_lang: &str,
    sample: &str,
    detector: &dyn LanguageDetector,
) -> String {
    if !language_utils::is_auto_detect(source_lang) {
        return source_lang.to_string();
    }
    match detector.detect_iso(sample) {
        Some(detected) => {
            info!("Detected source language: {}", detected);
            detected
        }
        None => {
            warn!("Could not detect the source language, letting providers decide");
            source_lang.to_string()
        }
    }
}
