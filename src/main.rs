// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use multilingo::app_config::{self, Config};
use multilingo::database::Repository;
use multilingo::language_utils;
use multilingo::translation::pipeline::resolve_source_language;
use multilingo::translation::{
    CsvBatchTranslator, CsvJob, TranslationOrigin, TranslationPipeline, WhatlangDetector,
};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

/// multilingo - fault-tolerant multi-provider translation
///
/// Fans every request out to all configured providers, remembers results in
/// a local translation memory and resumes interrupted CSV jobs.
#[derive(Parser, Debug)]
#[command(name = "multilingo")]
#[command(version)]
#[command(about = "Multi-provider translation with memory and resumable batches")]
#[command(long_about = "multilingo translates text through several providers at once, keeps a
translation memory and resumes interrupted CSV jobs from checkpoints.

EXAMPLES:
    multilingo translate -i story.txt -o story.uk.txt -t uk
    multilingo translate -i story.txt -t fr --chunk-size 2000 --fuzzy 0.9
    multilingo csv -i data.csv -o out.csv -t uk -l 1 -l 3
    multilingo csv -i data.csv -o out.csv -t uk --resume cp_0123abcd
    multilingo cache stats
    multilingo glossary add en uk API API
    multilingo completions bash > multilingo.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server (default: http://localhost:11434)
    amazon    - Amazon Translate (not implemented yet)
    ibm       - IBM Watson Translate (not implemented yet)
    doclingo  - Doclingo (not implemented yet)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Translation memory database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a text file
    Translate(TranslateArgs),

    /// Translate columns of a CSV file
    Csv(CsvArgs),

    /// Inspect and maintain the translation memory
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Manage glossary terms
    #[command(subcommand)]
    Glossary(GlossaryCommand),

    /// Generate shell completions for multilingo
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Language options shared by translation commands
#[derive(Args, Debug)]
struct LanguageArgs {
    /// Source language code, or 'auto'
    #[arg(short, long)]
    source: Option<String>,

    /// Target language code
    #[arg(short, long)]
    target: Option<String>,

    /// Do not read or write the translation memory
    #[arg(long)]
    no_cache: bool,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input text file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    languages: LanguageArgs,

    /// Maximum chunk size in characters (0 = no chunking)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Fuzzy memory threshold between 0 and 1 (0 disables)
    #[arg(long)]
    fuzzy: Option<f64>,

    /// Extra instructions for LLM providers
    #[arg(long)]
    instructions: Option<String>,
}

#[derive(Args, Debug)]
struct CsvArgs {
    /// Input CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    languages: LanguageArgs,

    /// Column index to translate (0-indexed, repeatable; default: all columns)
    #[arg(short = 'l', long = "column")]
    columns: Vec<usize>,

    /// Copy the first row unchanged
    #[arg(long)]
    skip_header: bool,

    /// Resume an interrupted job by checkpoint id
    #[arg(long)]
    resume: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// List memory entries, most recently used first
    List {
        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show memory and database statistics
    Stats,
    /// Delete an entry permanently
    Delete { id: String },
    /// Exclude an entry from lookups without deleting it
    Invalidate { id: String },
    /// Delete every entry
    Clear,
}

#[derive(Subcommand, Debug)]
enum GlossaryCommand {
    /// Add or replace a term
    Add {
        source_lang: String,
        target_lang: String,
        source_term: String,
        target_term: String,
    },
    /// List terms
    List {
        /// Filter by source language
        #[arg(short, long)]
        source: Option<String>,
        /// Filter by target language
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Delete a term by id
    Delete { id: String },
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();
    if let Some(level) = cli.log_level {
        log::set_max_level(level_filter(level.into()));
    }

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(*shell, &mut cmd, "multilingo", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(&cli, args).await,
        Commands::Csv(args) => run_csv(&cli, args).await,
        Commands::Cache(command) => run_cache(&cli, command).await,
        Commands::Glossary(command) => run_glossary(&cli, command).await,
    }
}

/// Load the configuration, creating a default file when missing
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        warn!(
            "Config file not found at {:?}, creating default config.",
            cli.config
        );
        let config = Config::default();
        config.save_to_file(&cli.config)?;
        config
    };

    if let Some(db) = &cli.db {
        config.store.db_path = Some(db.clone());
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    } else {
        log::set_max_level(level_filter(config.log_level));
    }
    Ok(config)
}

fn apply_language_args(config: &mut Config, languages: &LanguageArgs) {
    if let Some(source) = &languages.source {
        config.source_language = source.clone();
    }
    if let Some(target) = &languages.target {
        config.target_language = target.clone();
    }
    if languages.no_cache {
        config.store.enabled = false;
    }
}

fn open_store(config: &Config) -> Result<Option<Repository>> {
    if !config.store.enabled {
        return Ok(None);
    }
    let store = match &config.store.db_path {
        Some(path) => Repository::new(multilingo::database::DatabaseConnection::new(path)?),
        None => Repository::new_default()?,
    };
    Ok(Some(store))
}

fn require_store(config: &Config) -> Result<Repository> {
    let config = Config {
        store: app_config::StoreConfig {
            enabled: true,
            ..config.store.clone()
        },
        ..config.clone()
    };
    open_store(&config)?.ok_or_else(|| anyhow!("translation memory is unavailable"))
}

/// Cancel the token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            token.cancel();
        }
    });
    cancel
}

async fn run_translate(cli: &CommandLineOptions, args: &TranslateArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    apply_language_args(&mut config, &args.languages);
    if let Some(chunk_size) = args.chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    if let Some(fuzzy) = args.fuzzy {
        config.fuzzy_threshold = fuzzy;
    }
    if let Some(instructions) = &args.instructions {
        config.instructions = Some(instructions.clone());
    }
    config.validate().context("Configuration validation failed")?;

    if args.output.as_deref() == Some(args.input.as_path()) {
        return Err(anyhow!("input file and output file cannot be the same"));
    }

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {:?}", args.input))?;
    let source_lang =
        resolve_source_language(&config.source_language, &text, &WhatlangDetector);
    let target_lang = config.target_language.clone();

    let pipeline = TranslationPipeline::from_config(&config, open_store(&config)?)?;
    let cancel = cancel_on_ctrl_c();
    let output = pipeline
        .translate(&text, &source_lang, &target_lang, &cancel)
        .await?;

    match &args.output {
        Some(path) => write_output(path, &output.text)?,
        None => println!("{}", output.text),
    }

    let from_cache = output.origin != TranslationOrigin::Providers;
    info!(
        "Successfully translated {} to {}{}",
        source_lang,
        target_lang,
        if from_cache { " (from cache)" } else { "" }
    );
    Ok(())
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write output file: {:?}", path))
}

async fn run_csv(cli: &CommandLineOptions, args: &CsvArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    apply_language_args(&mut config, &args.languages);
    config.validate().context("Configuration validation failed")?;

    let pipeline = TranslationPipeline::from_config(&config, open_store(&config)?)?;

    let mut job = CsvJob::new(
        &args.input,
        &args.output,
        config.source_language.clone(),
        config.target_language.clone(),
    );
    job.columns = args.columns.clone();
    job.skip_header = args.skip_header;
    job.resume = args.resume.clone();

    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({percent}%) {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    let bar = progress_bar.clone();

    let report = CsvBatchTranslator::new(&pipeline)
        .with_progress(Box::new(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        }))
        .run(&job, &cancel_on_ctrl_c())
        .await?;
    progress_bar.finish_and_clear();

    info!(
        "CSV done: {} translated, {} from memory, {} resumed, {} failed",
        report.translated, report.cached, report.resumed, report.failed
    );
    Ok(())
}

async fn run_cache(cli: &CommandLineOptions, command: &CacheCommand) -> Result<()> {
    let config = load_config(cli)?;
    let store = require_store(&config)?;

    match command {
        CacheCommand::List { limit } => {
            for entry in store.list_memory(*limit).await? {
                println!(
                    "{}  {}->{}  uses={}{}  {}",
                    entry.id,
                    entry.source_lang,
                    entry.target_lang,
                    entry.usage_count,
                    if entry.invalidated { " [invalidated]" } else { "" },
                    truncate(&entry.source_text, 60)
                );
            }
        }
        CacheCommand::Stats => {
            println!("Memory: {}", store.memory_stats().await?);
            println!("Database: {}", store.connection().stats()?);
        }
        CacheCommand::Delete { id } => report_change(store.delete_memory(id).await?, "Deleted", id)?,
        CacheCommand::Invalidate { id } => {
            report_change(store.invalidate_memory(id).await?, "Invalidated", id)?
        }
        CacheCommand::Clear => {
            let removed = store.clear_memory().await?;
            println!("Removed {} entries", removed);
        }
    }
    Ok(())
}

async fn run_glossary(cli: &CommandLineOptions, command: &GlossaryCommand) -> Result<()> {
    let config = load_config(cli)?;
    let store = require_store(&config)?;

    match command {
        GlossaryCommand::Add {
            source_lang,
            target_lang,
            source_term,
            target_term,
        } => {
            language_utils::validate_language_code(source_lang)?;
            language_utils::validate_language_code(target_lang)?;
            store
                .add_glossary_term(source_lang, target_lang, source_term, target_term)
                .await?;
            println!("{} -> {} ({}->{})", source_term, target_term, source_lang, target_lang);
        }
        GlossaryCommand::List { source, target } => {
            for entry in store
                .list_glossary_terms(source.as_deref(), target.as_deref())
                .await?
            {
                println!(
                    "{}  {}->{}  {} -> {}",
                    entry.id, entry.source_lang, entry.target_lang, entry.source_term, entry.target_term
                );
            }
        }
        GlossaryCommand::Delete { id } => {
            report_change(store.delete_glossary_term(id).await?, "Deleted", id)?
        }
    }
    Ok(())
}

fn report_change(changed: bool, verb: &str, id: &str) -> Result<()> {
    if !changed {
        return Err(anyhow!("No entry with id {}", id));
    }
    println!("{} {}", verb, id);
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{}...", cut)
}
