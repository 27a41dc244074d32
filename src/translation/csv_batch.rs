/*!
 * Cell-by-cell CSV translation with checkpoint resume.
 *
 * Every translated cell is written to the checkpoint as soon as it is
 * known, so an interrupted job restarted with the same checkpoint id only
 * translates the cells that are still missing. A cell whose providers all
 * fail keeps its source text and does not stop the batch.
 */

use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::database::models::cell_key;
use crate::database::validate_checkpoint_id;
use crate::errors::{AppError, TranslationError};
use crate::translation::pipeline::{TranslationPipeline, resolve_source_language};
use crate::translation::validator::WhatlangDetector;

/// Description of one CSV batch job
#[derive(Debug, Clone, PartialEq)]
pub struct CsvJob {
    /// Input CSV file
    pub input: PathBuf,
    /// Output CSV file
    pub output: PathBuf,
    /// Source language code (`auto` detects from the first data row)
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Zero-based columns to translate; empty means all
    pub columns: Vec<usize>,
    /// Copy the first row unchanged
    pub skip_header: bool,
    /// Checkpoint id of an interrupted run
    pub resume: Option<String>,
}

impl CsvJob {
    /// Job translating every column
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            columns: Vec::new(),
            skip_header: false,
            resume: None,
        }
    }
}

/// Summary of a finished job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvReport {
    /// Checkpoint used by the run, if a store was attached
    pub checkpoint_id: Option<String>,
    /// Cells translated by providers
    pub translated: usize,
    /// Cells taken from the checkpoint of an earlier run
    pub resumed: usize,
    /// Cells served by the translation memory
    pub cached: usize,
    /// Cells left untranslated after every provider failed
    pub failed: usize,
}

/// Progress callback: (cells done, cells total)
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Translates the cells of a CSV file through a [`TranslationPipeline`]
pub struct CsvBatchTranslator<'a> {
    pipeline: &'a TranslationPipeline,
    progress: Option<ProgressCallback>,
}

impl<'a> CsvBatchTranslator<'a> {
    /// Create a translator over a pipeline
    pub fn new(pipeline: &'a TranslationPipeline) -> Self {
        Self {
            pipeline,
            progress: None,
        }
    }

    /// Report progress after every cell
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run a job to completion
    pub async fn run(&self, job: &CsvJob, cancel: &CancellationToken) -> Result<CsvReport, AppError> {
        if job.input == job.output {
            return Err(AppError::Config(
                "input file and output file cannot be the same".to_string(),
            ));
        }

        let mut records = read_records(&job.input)?;
        if records.is_empty() {
            return Err(AppError::File(format!("CSV file is empty: {:?}", job.input)));
        }

        let first_data_row = usize::from(job.skip_header);
        let sample = records
            .get(first_data_row)
            .and_then(|row| row.iter().find(|cell| !cell.trim().is_empty()))
            .cloned()
            .unwrap_or_default();
        let source_lang = resolve_source_language(&job.source_lang, &sample, &WhatlangDetector);
        let target_lang = job.target_lang.as_str();

        let mut report = CsvReport::default();
        let (checkpoint_id, completed) = self.open_checkpoint(job, &source_lang).await?;
        report.checkpoint_id = checkpoint_id.clone();

        let selected: HashSet<usize> = job.columns.iter().copied().collect();
        let cells: Vec<(usize, usize)> = records
            .iter()
            .enumerate()
            .skip(first_data_row)
            .flat_map(|(row, fields)| {
                fields
                    .iter()
                    .enumerate()
                    .filter(|(col, text)| {
                        (selected.is_empty() || selected.contains(col)) && !text.is_empty()
                    })
                    .map(move |(col, _)| (row, col))
            })
            .collect();
        let total = cells.len();
        info!("{} cells to translate", total);

        let glossary = self.pipeline.load_glossary(&source_lang, target_lang).await;
        let store = self.pipeline.store();

        for (done, (row, col)) in cells.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled.into());
            }

            let key = cell_key(row, col);
            if let Some(translated) = completed.get(&key) {
                records[row][col] = translated.clone();
                report.resumed += 1;
                self.report_progress(done + 1, total);
                continue;
            }

            let source_text = records[row][col].clone();
            let segment = self
                .pipeline
                .translate_segment(&source_text, &source_lang, target_lang, "", &glossary, done + 1, cancel)
                .await;

            match segment {
                Ok(segment) => {
                    if segment.from_memory {
                        report.cached += 1;
                    } else {
                        report.translated += 1;
                    }
                    if let (Some(store), Some(id)) = (store, checkpoint_id.as_deref()) {
                        if let Err(e) = store.save_csv_cell(id, row, col, &segment.text).await {
                            warn!("Failed to checkpoint row {} col {}: {:#}", row, col, e);
                        }
                    }
                    records[row][col] = segment.text;
                }
                Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled.into()),
                Err(e) => {
                    warn!("Row {} col {}: {}, keeping original", row, col, e);
                    report.failed += 1;
                }
            }
            self.report_progress(done + 1, total);
        }

        write_records(&job.output, &records)?;

        if let (Some(store), Some(id)) = (store, checkpoint_id.as_deref()) {
            if let Err(e) = store.complete_csv_checkpoint(id).await {
                warn!("Failed to complete checkpoint {}: {:#}", id, e);
            }
        }

        info!("CSV translated successfully: {:?}", job.output);
        Ok(report)
    }

    /// Checkpoint id and already translated cells
    async fn open_checkpoint(
        &self,
        job: &CsvJob,
        source_lang: &str,
    ) -> Result<(Option<String>, HashMap<String, String>), AppError> {
        let store = self.pipeline.store();

        if let Some(resume) = &job.resume {
            validate_checkpoint_id(resume)?;
            let store = store.ok_or_else(|| {
                AppError::Config("resuming a CSV job requires the translation memory".to_string())
            })?;
            if store.get_csv_checkpoint(resume).await?.is_none() {
                return Err(AppError::Config(format!("unknown checkpoint: {}", resume)));
            }
            let cells = store.get_csv_cells(resume).await?;
            info!(
                "Resuming checkpoint {} ({} cells already done)",
                resume,
                cells.len()
            );
            return Ok((Some(resume.clone()), cells));
        }

        let Some(store) = store else {
            return Ok((None, HashMap::new()));
        };

        let created = store
            .create_csv_checkpoint(
                &job.input.to_string_lossy(),
                &job.output.to_string_lossy(),
                source_lang,
                &job.target_lang,
            )
            .await;
        match created {
            Ok(id) => {
                info!("Checkpoint ID: {} (use --resume {} to resume if interrupted)", id, id);
                Ok((Some(id), HashMap::new()))
            }
            Err(e) => {
                warn!("Failed to create checkpoint: {:#}", e);
                Ok((None, HashMap::new()))
            }
        }
    }

    fn report_progress(&self, done: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(done, total);
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<Vec<String>>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_path(path)
        .map_err(|e| AppError::File(format!("failed to open input CSV {:?}: {}", path, e)))?;

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| AppError::File(format!("failed to read CSV: {}", e)))
        })
        .collect()
}

fn write_records(path: &Path, records: &[Vec<String>]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::File(format!("failed to create output CSV {:?}: {}", path, e)))?;

    for record in records {
        writer
            .write_record(record)
            .map_err(|e| AppError::File(format!("failed to write output CSV: {}", e)))?;
    }
    writer.flush()?;
    Ok(())
}
