/*!
 * # multilingo - fault-tolerant multi-provider translation
 *
 * A Rust library that translates text through several unreliable
 * translation and LLM providers at once and remembers what it produced.
 *
 * ## Features
 *
 * - Parallel provider calls with per-attempt timeouts and exponential back-off
 * - Target-language validation of provider output
 * - Persistent translation memory with exact and fuzzy lookup
 * - Stage-1 draft cache so refinement can be skipped on repeat runs
 * - Per-language-pair glossary injected into prompts
 * - Boundary-aware chunking with sliding-window context
 * - Resumable CSV batch translation backed by checkpoints
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `providers`: Provider contract and its variants:
 *   - `providers::ollama`: Ollama API client and refiner
 *   - `providers::stub`: Services without a client yet
 *   - `providers::mock`: Scripted provider for tests
 * - `translation`: Translation flow:
 *   - `translation::chunker`: Chunking and context extraction
 *   - `translation::orchestrator`: Parallel execution with retries
 *   - `translation::pipeline`: Memory lookup and per-chunk translation
 *   - `translation::csv_batch`: Resumable CSV jobs
 * - `database`: SQLite translation memory and checkpoints
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::Repository;
pub use errors::{AppError, ProviderError, TranslationError, ValidationError};
pub use language_utils::{get_language_name, language_codes_match};
pub use providers::{Provider, ProviderResult, ServiceConfig, TranslateRequest};
pub use translation::{Orchestrator, OrchestratorConfig, TranslationPipeline};
