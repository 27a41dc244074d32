/*!
 * Integration tests for the full translation pipeline.
 *
 * Providers are scripted mocks; the translation memory is real SQLite,
 * either in memory or in a temporary file.
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use multilingo::app_config::{Config, StoreConfig, TranslationProvider};
use multilingo::database::{DatabaseConnection, Repository};
use multilingo::providers::mock::MockProvider;
use multilingo::providers::stub::StubProvider;
use multilingo::translation::pipeline::resolve_source_language;
use multilingo::translation::{
    Arbiter, Evaluation, Orchestrator, OrchestratorConfig, PipelineOptions, Refiner,
    TranslationOrigin, TranslationPipeline, WhatlangDetector,
};
use multilingo::{Provider, ProviderResult, TranslationError};

use crate::common::{self, mock_providers};

/// Joins every provider output with " / "
struct Blender;

#[async_trait]
impl Arbiter for Blender {
    async fn evaluate(
        &self,
        _source_text: &str,
        _source_lang: &str,
        _target_lang: &str,
        results: &[ProviderResult],
    ) -> Result<Evaluation> {
        let mut texts: Vec<&str> = results.iter().map(|r| r.translated_text.as_str()).collect();
        texts.sort_unstable();
        Ok(Evaluation {
            selected_service: "composite".to_string(),
            composite_text: texts.join(" / "),
            is_composite: true,
            reasoning: "both are partial".to_string(),
        })
    }
}

/// Appends a marker and counts its calls
#[derive(Default)]
struct CountingRefiner {
    calls: AtomicUsize,
}

#[async_trait]
impl Refiner for CountingRefiner {
    async fn refine(&self, _: &str, _: &str, _: &str, draft: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if draft.is_empty() {
            return Err(anyhow!("nothing to refine"));
        }
        Ok(format!("{} (polished)", draft))
    }
}

fn pipeline(providers: Vec<Arc<dyn Provider>>, config: OrchestratorConfig) -> TranslationPipeline {
    TranslationPipeline::new(
        Orchestrator::new(providers, config).unwrap(),
        PipelineOptions::default(),
    )
}

fn count_rows(store: &Repository, table: &'static str) -> Result<i64> {
    store.connection().execute(|conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
    })
}

/// Only successful outputs reach the audit trail; the memory credits the chosen service
#[tokio::test]
async fn test_translate_withMixedProviders_shouldRecordAuditTrail() -> Result<()> {
    common::init_logging();
    let store = Repository::new_in_memory()?;
    let pipeline = pipeline(
        vec![
            Arc::new(MockProvider::working("good").with_custom_response(mock_providers::tagged)),
            Arc::new(MockProvider::failing("bad")),
            Arc::new(StubProvider::new(TranslationProvider::Ibm)),
        ],
        common::fast_config(),
    )
    .with_store(store.clone());

    let output = pipeline
        .translate("Hello world", "en", "fr", &CancellationToken::new())
        .await?;

    assert_eq!(output.text, "fr:Hello world");
    assert_eq!(count_rows(&store, "translation_requests")?, 1);
    assert_eq!(count_rows(&store, "translation_results")?, 1);
    assert_eq!(count_rows(&store, "final_translations")?, 1);

    let entry = store.list_memory(None).await?.remove(0);
    assert_eq!(entry.service_used, "good");
    assert_eq!(entry.draft_text.as_deref(), Some("fr:Hello world"));
    Ok(())
}

#[tokio::test]
async fn test_translate_withArbiterBlend_shouldPersistComposite() -> Result<()> {
    let store = Repository::new_in_memory()?;
    let pipeline = pipeline(
        vec![
            Arc::new(MockProvider::working("a").with_custom_response(mock_providers::tagged)),
            Arc::new(MockProvider::working("b").with_custom_response(mock_providers::upper)),
        ],
        common::fast_config(),
    )
    .with_store(store.clone())
    .with_arbiter(Arc::new(Blender));

    let output = pipeline
        .translate("Hello", "en", "fr", &CancellationToken::new())
        .await?;

    assert_eq!(output.text, "HELLO / fr:Hello");
    let composite: i64 = store.connection().execute(|conn| {
        Ok(conn.query_row("SELECT is_composite FROM final_translations", [], |row| row.get(0))?)
    })?;
    assert_eq!(composite, 1);
    assert_eq!(store.list_memory(None).await?[0].service_used, "composite");
    Ok(())
}

#[tokio::test]
async fn test_translate_belowMinimumSuccesses_shouldFailWithChunkNumber() {
    let config = OrchestratorConfig {
        min_successes: 2,
        ..common::fast_config()
    };
    let pipeline = pipeline(
        vec![
            Arc::new(MockProvider::working("good")),
            Arc::new(MockProvider::failing("bad")),
        ],
        config,
    );

    let err = pipeline
        .translate("Hello", "en", "fr", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        TranslationError::AllProvidersFailed { chunk, errors } => {
            assert_eq!(chunk, 1);
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("[bad]"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_translate_withFuzzyThreshold_shouldServeNearMatch() -> Result<()> {
    let store = Repository::new_in_memory()?;
    store
        .save_to_memory("The weather is lovely today.", "en", "fr", "Il fait beau.", None, "ollama")
        .await?;
    let provider = MockProvider::working("a");
    let pipeline = TranslationPipeline::new(
        Orchestrator::new(common::providers(vec![provider.clone()]), common::fast_config())?,
        PipelineOptions {
            fuzzy_threshold: 0.9,
            ..PipelineOptions::default()
        },
    )
    .with_store(store);

    let output = pipeline
        .translate("The weather is lovely today!", "en", "fr", &CancellationToken::new())
        .await?;

    assert_eq!(output.origin, TranslationOrigin::FuzzyMemory);
    assert_eq!(output.text, "Il fait beau.");
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

/// Long inputs are remembered chunk by chunk
#[tokio::test]
async fn test_translate_withChunks_shouldRememberEachChunk() -> Result<()> {
    let store = Repository::new_in_memory()?;
    let provider = MockProvider::working("a").with_custom_response(mock_providers::upper);
    let pipeline = TranslationPipeline::new(
        Orchestrator::new(common::providers(vec![provider.clone()]), common::fast_config())?,
        PipelineOptions {
            chunk_size: 20,
            ..PipelineOptions::default()
        },
    )
    .with_store(store.clone());
    let cancel = CancellationToken::new();

    let first = pipeline
        .translate("One short line.\n\nAnother short line.", "en", "fr", &cancel)
        .await?;
    let second = pipeline
        .translate("Another short line.\n\nOne short line.", "en", "fr", &cancel)
        .await?;

    assert_eq!(first.chunks, 2);
    assert_eq!(first.text, "ONE SHORT LINE.\n\nANOTHER SHORT LINE.");
    assert_eq!(second.text, "ANOTHER SHORT LINE.\n\nONE SHORT LINE.");
    assert_eq!(provider.call_count(), 2);
    assert_eq!(store.memory_stats().await?.total, 2);
    Ok(())
}

/// A draft survives invalidation of the final text, so providers are not asked again
#[tokio::test]
async fn test_translate_afterInvalidation_shouldRefineStoredDraft() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("memory.db");
    let provider = MockProvider::working("ollama").with_custom_response(mock_providers::tagged);
    let refiner = Arc::new(CountingRefiner::default());

    {
        let store = Repository::new(DatabaseConnection::new(&path)?);
        let pipeline = pipeline(common::providers(vec![provider.clone()]), common::fast_config())
            .with_store(store.clone())
            .with_refiner(refiner.clone());
        let output = pipeline
            .translate("Good night", "en", "uk", &CancellationToken::new())
            .await?;
        assert_eq!(output.text, "uk:Good night (polished)");

        let id = store.list_memory(None).await?.remove(0).id;
        assert!(store.invalidate_memory(&id).await?);
    }

    let store = Repository::new(DatabaseConnection::new(&path)?);
    let pipeline = pipeline(common::providers(vec![provider.clone()]), common::fast_config())
        .with_store(store)
        .with_refiner(refiner.clone());
    let output = pipeline
        .translate("Good night", "en", "uk", &CancellationToken::new())
        .await?;

    assert_eq!(output.text, "uk:Good night (polished)");
    assert_eq!(provider.call_count(), 1);
    assert_eq!(refiner.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

/// A pipeline built from configuration serves stored translations without network
#[tokio::test]
async fn test_fromConfig_withSeededStore_shouldServeFromMemory() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("memory.db");
    let seeded = Repository::new(DatabaseConnection::new(&path)?);
    seeded
        .save_to_memory("Good morning", "en", "uk", "Добрий ранок", None, "ollama")
        .await?;
    drop(seeded);

    let config = Config {
        store: StoreConfig {
            enabled: true,
            db_path: Some(path.clone()),
        },
        ..Config::default()
    };
    let store = Repository::new(DatabaseConnection::new(&path)?);
    let pipeline = TranslationPipeline::from_config(&config, Some(store))?;

    let output = pipeline
        .translate("Good morning", "en", "uk", &CancellationToken::new())
        .await?;

    assert_eq!(output.origin, TranslationOrigin::Memory);
    assert_eq!(output.text, "Добрий ранок");
    Ok(())
}

#[test]
fn test_resolveSourceLanguage_withEnglishSample_shouldDetectEnglish() {
    let sample = "The weather is wonderful today and we are going to walk in the park together with our friends.";

    assert_eq!(resolve_source_language("auto", sample, &WhatlangDetector), "en");
    assert_eq!(resolve_source_language("de", sample, &WhatlangDetector), "de");
}

/// Each chunk request carries the tail of the previous translation
#[tokio::test]
async fn test_translate_withChunks_shouldPassSlidingContext() -> Result<()> {
    let pipeline = TranslationPipeline::new(
        Orchestrator::new(
            common::providers(vec![
                MockProvider::working("a").with_custom_response(mock_providers::with_context),
            ]),
            common::fast_config(),
        )?,
        PipelineOptions {
            chunk_size: 20,
            context_words: 2,
            ..PipelineOptions::default()
        },
    );

    let output = pipeline
        .translate("One short line.\n\nAnother short line.", "en", "fr", &CancellationToken::new())
        .await?;

    assert_eq!(output.text, "[] One short line.\n\n[short line.] Another short line.");
    Ok(())
}
