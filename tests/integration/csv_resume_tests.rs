/*!
 * Integration tests for CSV batches that are interrupted and resumed.
 *
 * The first run is stopped through its cancellation token after a few
 * cells; the second run picks up the checkpoint from the same database file.
 */

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use multilingo::database::models::CheckpointStatus;
use multilingo::database::{DatabaseConnection, Repository};
use multilingo::errors::{AppError, ProviderError, TranslationError};
use multilingo::providers::mock::MockProvider;
use multilingo::translation::{
    CsvBatchTranslator, CsvJob, Orchestrator, PipelineOptions, TranslationPipeline,
};
use multilingo::{Provider, ProviderResult, ServiceConfig, TranslateRequest};

use crate::common::{self, mock_providers};

/// Uppercases text and pulls the plug after a number of calls
#[derive(Debug)]
struct InterruptingProvider {
    cancel: CancellationToken,
    stop_after: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for InterruptingProvider {
    fn name(&self) -> &str {
        "interrupting"
    }

    async fn translate(
        &self,
        _config: &ServiceConfig,
        request: &TranslateRequest,
    ) -> Result<ProviderResult, ProviderError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.stop_after {
            self.cancel.cancel();
        }
        Ok(ProviderResult::new(self.name(), mock_providers::upper(request), 0.8))
    }

    async fn is_available(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn supported_languages(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

fn pipeline(provider: Arc<dyn Provider>, store: Repository) -> TranslationPipeline {
    TranslationPipeline::new(
        Orchestrator::new(vec![provider], common::fast_config()).unwrap(),
        PipelineOptions::default(),
    )
    .with_store(store)
}

fn running_checkpoint(store: &Repository) -> Result<String> {
    store.connection().execute(|conn| {
        Ok(conn.query_row(
            "SELECT id FROM csv_checkpoints WHERE status = 'running'",
            [],
            |row| row.get(0),
        )?)
    })
}

fn open(path: &Path) -> Result<Repository> {
    Ok(Repository::new(DatabaseConnection::new(path)?))
}

#[tokio::test]
async fn test_run_interruptedThenResumed_shouldTranslateRemainingCells() -> Result<()> {
    common::init_logging();
    let dir = common::create_temp_dir()?;
    let db_path = dir.path().join("memory.db");
    let input = common::create_test_file(dir.path(), "in.csv", "word\nalpha\nbeta\ngamma\ndelta\n")?;
    let output = dir.path().join("out.csv");
    let mut job = CsvJob::new(&input, &output, "en", "fr");
    job.skip_header = true;

    // First run stops after two cells
    let checkpoint_id = {
        let cancel = CancellationToken::new();
        let provider = Arc::new(InterruptingProvider {
            cancel: cancel.clone(),
            stop_after: 2,
            calls: AtomicUsize::new(0),
        });
        let store = open(&db_path)?;
        let pipeline = pipeline(provider, store.clone());

        let err = CsvBatchTranslator::new(&pipeline)
            .run(&job, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Translation(TranslationError::Cancelled)));
        assert!(!output.exists());
        running_checkpoint(&store)?
    };

    // Second run in a fresh process
    let store = open(&db_path)?;
    assert_eq!(store.get_csv_cells(&checkpoint_id).await?.len(), 2);

    let provider = MockProvider::working("ollama").with_custom_response(mock_providers::upper);
    let pipeline = pipeline(Arc::new(provider.clone()), store.clone());
    job.resume = Some(checkpoint_id.clone());

    let report = CsvBatchTranslator::new(&pipeline)
        .run(&job, &CancellationToken::new())
        .await?;

    assert_eq!(report.checkpoint_id.as_deref(), Some(checkpoint_id.as_str()));
    assert_eq!(report.resumed, 2);
    assert_eq!(report.translated, 2);
    assert_eq!(provider.call_count(), 2);
    assert_eq!(
        std::fs::read_to_string(&output)?,
        "word\nALPHA\nBETA\nGAMMA\nDELTA\n"
    );

    let checkpoint = store.get_csv_checkpoint(&checkpoint_id).await?.unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::Completed);
    Ok(())
}

/// Repeated cells are served by the translation memory within one run
#[tokio::test]
async fn test_run_withRepeatedCells_shouldHitMemory() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let input = common::create_test_file(dir.path(), "in.csv", "yes,no\nno,yes\n")?;
    let output = dir.path().join("nested").join("out.csv");
    let provider = MockProvider::working("ollama").with_custom_response(mock_providers::upper);
    let pipeline = pipeline(Arc::new(provider.clone()), Repository::new_in_memory()?);

    let report = CsvBatchTranslator::new(&pipeline)
        .run(&CsvJob::new(&input, &output, "en", "fr"), &CancellationToken::new())
        .await?;

    assert_eq!(report.translated, 2);
    assert_eq!(report.cached, 2);
    assert_eq!(provider.call_count(), 2);
    assert_eq!(std::fs::read_to_string(&output)?, "YES,NO\nNO,YES\n");
    Ok(())
}

#[tokio::test]
async fn test_run_withUnknownCheckpoint_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let input = common::create_test_file(dir.path(), "in.csv", "alpha\n")?;
    let pipeline = pipeline(Arc::new(MockProvider::working("ollama")), Repository::new_in_memory()?);
    let mut job = CsvJob::new(&input, dir.path().join("out.csv"), "en", "fr");
    job.resume = Some("cp_0123456789abcdef".to_string());

    let err = CsvBatchTranslator::new(&pipeline)
        .run(&job, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("unknown checkpoint"));
    Ok(())
}

/// `auto` is resolved from the first data row before the checkpoint is created
#[tokio::test]
async fn test_run_withAutoSource_shouldRecordDetectedLanguage() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let input = common::create_test_file(
        dir.path(),
        "in.csv",
        "text\n\"The committee will publish its final report on the new railway next spring.\"\n",
    )?;
    let output = dir.path().join("out.csv");
    let store = Repository::new_in_memory()?;
    let pipeline = pipeline(Arc::new(MockProvider::working("ollama")), store.clone());
    let mut job = CsvJob::new(&input, &output, "auto", "fr");
    job.skip_header = true;

    let report = CsvBatchTranslator::new(&pipeline)
        .run(&job, &CancellationToken::new())
        .await?;

    let id = report.checkpoint_id.unwrap();
    let checkpoint = store.get_csv_checkpoint(&id).await?.unwrap();
    assert_eq!(checkpoint.source_lang, "en");
    Ok(())
}
