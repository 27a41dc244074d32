/*!
 * Parallel provider orchestration.
 *
 * Every configured provider gets its own task running an independent retry
 * loop. Outcomes are fanned in through a channel in completion order and
 * the caller waits until every task has reported.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{ProviderError, TranslationError};
use crate::providers::{Provider, ProviderResult, ServiceConfig, TranslateRequest};
use crate::translation::validator::{LanguageValidator, Validator, WhatlangDetector};

/// Default per-attempt deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempts per provider (one call plus two retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base back-off
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Retry, timeout and validation policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Deadline of a single provider call
    pub timeout: Duration,
    /// Successful providers the caller requires
    pub min_successes: usize,
    /// Attempts per provider, first call included
    pub max_attempts: u32,
    /// Wait before the first retry, doubled for each later one
    pub retry_delay: Duration,
    /// Check output language against the requested target
    pub validate_language: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            min_successes: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            validate_language: true,
        }
    }
}

impl OrchestratorConfig {
    /// Replace unset values with defaults
    fn normalized(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.max_attempts == 0 {
            self.max_attempts = DEFAULT_MAX_ATTEMPTS;
        }
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        self
    }
}

/// Wait before attempt number `attempt` (zero-based)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    base.saturating_mul(2u32.saturating_pow(attempt - 1))
}

/// Aggregated result of one orchestration run
#[derive(Debug, Clone, Default)]
pub struct OrchestrationOutcome {
    /// Successful results in completion order
    pub results: Vec<ProviderResult>,
    /// Final error of every failed provider
    pub errors: Vec<TranslationError>,
    /// Number of providers that produced a result
    pub succeeded: usize,
    /// Number of providers that did not
    pub failed: usize,
}

impl OrchestrationOutcome {
    /// Whether at least `min` providers succeeded
    pub fn meets_minimum(&self, min: usize) -> bool {
        self.succeeded >= min.max(1)
    }

    /// First successful result, if any
    pub fn first(&self) -> Option<&ProviderResult> {
        self.results.first()
    }

    /// Rendered errors, for reporting
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    fn record(&mut self, outcome: Result<ProviderResult, TranslationError>) {
        match outcome {
            Ok(result) => {
                self.succeeded += 1;
                self.results.push(result);
            }
            Err(e) => {
                self.failed += 1;
                self.errors.push(e);
            }
        }
    }
}

/// Runs all providers concurrently for one request
pub struct Orchestrator {
    providers: Vec<Arc<dyn Provider>>,
    config: OrchestratorConfig,
    validator: Option<Arc<dyn LanguageValidator>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("config", &self.config)
            .field("validates", &self.validator.is_some())
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator over a non-empty provider list
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        config: OrchestratorConfig,
    ) -> Result<Self, TranslationError> {
        if providers.is_empty() {
            return Err(TranslationError::NoProviders);
        }

        let config = config.normalized();
        let validator: Option<Arc<dyn LanguageValidator>> = if config.validate_language {
            Some(Arc::new(Validator::new(WhatlangDetector)))
        } else {
            None
        };

        Ok(Self {
            providers,
            config,
            validator,
        })
    }

    /// Replace the language validator (enables validation)
    pub fn with_validator(mut self, validator: Arc<dyn LanguageValidator>) -> Self {
        self.config.validate_language = true;
        self.validator = Some(validator);
        self
    }

    /// Effective configuration after defaults were applied
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Provider names in configuration order
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Run every provider and wait for all of them
    ///
    /// `cancel` is only observed while waiting between attempts; a call that
    /// is already in flight runs until it finishes or times out.
    pub async fn execute(
        &self,
        service_config: &ServiceConfig,
        request: &TranslateRequest,
        cancel: &CancellationToken,
    ) -> OrchestrationOutcome {
        let service_config = Arc::new(service_config.clone());
        let request = Arc::new(request.clone());
        let (tx, mut rx) = mpsc::channel(self.providers.len());
        let mut handles = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let worker = Worker {
                provider: Arc::clone(provider),
                config: self.config,
                validator: self.validator.clone(),
                service_config: Arc::clone(&service_config),
                request: Arc::clone(&request),
                cancel: cancel.clone(),
            };
            let tx = tx.clone();
            let name = provider.name().to_string();

            let handle = tokio::spawn(async move {
                let outcome = worker.translate_with_retry().await;
                // Receiver lives until every sender is gone
                let _ = tx.send(outcome).await;
            });
            handles.push((name, handle));
        }
        drop(tx);

        let mut outcome = OrchestrationOutcome::default();
        while let Some(result) = rx.recv().await {
            outcome.record(result);
        }

        // A worker that panicked never sent anything
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!("[{}] worker terminated abnormally: {}", name, e);
                outcome.record(Err(TranslationError::Provider {
                    provider: name,
                    source: ProviderError::RequestFailed(format!("worker terminated: {}", e)),
                }));
            }
        }

        debug!(
            "Orchestration finished: {} succeeded, {} failed",
            outcome.succeeded, outcome.failed
        );
        outcome
    }

    /// First successful result, or `None` when every provider failed
    pub async fn execute_with_fallback(
        &self,
        service_config: &ServiceConfig,
        request: &TranslateRequest,
        cancel: &CancellationToken,
    ) -> Option<ProviderResult> {
        self.execute(service_config, request, cancel)
            .await
            .results
            .into_iter()
            .next()
    }
}

/// State owned by one provider task
struct Worker {
    provider: Arc<dyn Provider>,
    config: OrchestratorConfig,
    validator: Option<Arc<dyn LanguageValidator>>,
    service_config: Arc<ServiceConfig>,
    request: Arc<TranslateRequest>,
    cancel: CancellationToken,
}

impl Worker {
    fn provider_error(&self, source: ProviderError) -> TranslationError {
        TranslationError::Provider {
            provider: self.provider.name().to_string(),
            source,
        }
    }

    async fn translate_with_retry(&self) -> Result<ProviderResult, TranslationError> {
        let name = self.provider.name();
        let max_attempts = self.config.max_attempts;
        let mut last_error: Option<TranslationError> = None;
        let mut unvalidated: Option<ProviderResult> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_delay, attempt);
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(TranslationError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let call = self.provider.translate(&self.service_config, &self.request);
            let result = match tokio::time::timeout(self.config.timeout, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!("[{}] attempt {}/{} failed: {}", name, attempt + 1, max_attempts, e);
                    last_error = Some(self.provider_error(e));
                    continue;
                }
                Err(_) => {
                    let e = ProviderError::Timeout(self.config.timeout);
                    warn!("[{}] attempt {}/{} failed: {}", name, attempt + 1, max_attempts, e);
                    last_error = Some(self.provider_error(e));
                    continue;
                }
            };

            if let Some(reported) = result.error.as_deref() {
                warn!(
                    "[{}] attempt {}/{} reported an error: {}",
                    name,
                    attempt + 1,
                    max_attempts,
                    reported
                );
                last_error = Some(self.provider_error(ProviderError::Reported(reported.to_string())));
                continue;
            }

            let Some(validator) = &self.validator else {
                return Ok(result);
            };

            match validator.is_valid(&result.translated_text, &self.request.target_lang) {
                Ok(()) => return Ok(result),
                Err(e) if attempt + 1 >= max_attempts => {
                    warn!(
                        "[{}] validation failed on final attempt, keeping result: {}",
                        name, e
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "[{}] attempt {}/{} failed validation: {}",
                        name,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(TranslationError::Validation {
                        provider: name.to_string(),
                        source: e,
                    });
                    unvalidated = Some(result);
                }
            }
        }

        if let Some(result) = unvalidated {
            warn!("[{}] keeping an earlier result that failed validation", name);
            return Ok(result);
        }

        Err(last_error.unwrap_or_else(|| {
            self.provider_error(ProviderError::RequestFailed("no attempt was made".to_string()))
        }))
    }
}
