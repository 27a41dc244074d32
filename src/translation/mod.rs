/*!
 * Translation flow built on top of the providers and the store.
 *
 * It is split into several submodules:
 *
 * - `chunker`: Boundary-aware splitting and sliding-window context
 * - `validator`: Target-language checks of provider output
 * - `orchestrator`: Parallel provider calls with retries
 * - `review`: Arbiter and refiner contracts
 * - `pipeline`: Memory lookup, chunking and per-chunk translation
 * - `csv_batch`: Resumable CSV translation
 */

// Re-export main types for easier usage
pub use self::csv_batch::{CsvBatchTranslator, CsvJob, CsvReport};
pub use self::orchestrator::{OrchestrationOutcome, Orchestrator, OrchestratorConfig};
pub use self::pipeline::{PipelineOptions, PipelineOutput, TranslationOrigin, TranslationPipeline};
pub use self::review::{Arbiter, Evaluation, Refiner};
pub use self::validator::{LanguageDetector, LanguageValidator, Validator, WhatlangDetector};

// Submodules
pub mod chunker;
pub mod csv_batch;
pub mod orchestrator;
pub mod pipeline;
pub mod review;
pub mod validator;
