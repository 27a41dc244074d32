/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scripted provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::fail_first(n)` - Fails the first N calls, then succeeds
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::succeed_first(n)` - Succeeds the first N calls, then fails
 * - `MockProvider::wrong_language()` - Answers in a language nobody asked for
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::errors::ProviderError;
use crate::providers::{Provider, ProviderResult, ServiceConfig, TranslateRequest};

/// Confidence reported by successful mock calls
pub const MOCK_CONFIDENCE: f64 = 0.9;

/// Text returned by [`MockBehavior::WrongLanguage`]; long enough to be detected
pub const WRONG_LANGUAGE_TEXT: &str =
    "Dies ist eindeutig ein deutscher Satz, der in der falschen Sprache geschrieben wurde. \
     Heute gehen wir zusammen mit unseren Freunden im Park spazieren, weil das Wetter wunderschön ist.";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with an error
    Failing,
    /// Fails the first `failures` calls with a transient error
    FailFirst { failures: usize },
    /// Succeeds the first `successes` calls, then fails with a connection error
    SucceedFirst { successes: usize },
    /// Succeeds with German text regardless of the target
    WrongLanguage,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
    /// Returns a result carrying a service-reported error string
    ReportedError,
}

/// Mock provider for testing orchestration behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Service name
    name: String,
    /// Behavior mode
    behavior: MockBehavior,
    /// Call counter, shared between clones
    call_count: Arc<AtomicUsize>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&TranslateRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Working)
    }

    /// Create a failing mock provider that always errors
    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Failing)
    }

    /// Create a mock that recovers after `failures` transient errors
    pub fn fail_first(name: impl Into<String>, failures: usize) -> Self {
        Self::new(name, MockBehavior::FailFirst { failures })
    }

    /// Create a mock that goes offline after `successes` answers
    pub fn succeed_first(name: impl Into<String>, successes: usize) -> Self {
        Self::new(name, MockBehavior::SucceedFirst { successes })
    }

    /// Create a mock that answers in the wrong language
    pub fn wrong_language(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::WrongLanguage)
    }

    /// Create a mock that sleeps before answering
    pub fn slow(name: impl Into<String>, delay_ms: u64) -> Self {
        Self::new(name, MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&TranslateRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of `translate` calls made so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn render(&self, request: &TranslateRequest) -> String {
        match self.custom_response {
            Some(generator) => generator(request),
            None => format!("[{}:{}] {}", self.name, request.target_lang, request.text),
        }
    }

    fn success(&self, request: &TranslateRequest, started: Instant) -> ProviderResult {
        ProviderResult::new(self.name.clone(), self.render(request), MOCK_CONFIDENCE)
            .with_metadata("attempt", self.call_count().to_string())
            .with_latency(started.elapsed())
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            behavior: self.behavior,
            call_count: Arc::clone(&self.call_count),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        _config: &ServiceConfig,
        request: &TranslateRequest,
    ) -> Result<ProviderResult, ProviderError> {
        let started = Instant::now();
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(self.success(request, started)),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),

            MockBehavior::FailFirst { failures } => {
                if count < failures {
                    Err(ProviderError::ConnectionError(format!(
                        "Simulated transient failure (call #{})",
                        count + 1
                    )))
                } else {
                    Ok(self.success(request, started))
                }
            }

            MockBehavior::SucceedFirst { successes } => {
                if count < successes {
                    Ok(self.success(request, started))
                } else {
                    Err(ProviderError::ConnectionError(format!(
                        "Simulated outage (call #{})",
                        count + 1
                    )))
                }
            }

            MockBehavior::WrongLanguage => Ok(ProviderResult::new(
                self.name.clone(),
                WRONG_LANGUAGE_TEXT,
                MOCK_CONFIDENCE,
            )
            .with_latency(started.elapsed())),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.success(request, started))
            }

            MockBehavior::ReportedError => Ok(ProviderResult::new(self.name.clone(), "", 0.0)
                .with_error("quota exceeded")
                .with_latency(started.elapsed())),
        }
    }

    async fn is_available(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Simulated provider is offline".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn supported_languages(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["en".to_string(), "fr".to_string(), "de".to_string(), "uk".to_string()])
    }
}
