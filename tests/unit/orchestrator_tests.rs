/*!
 * Tests for parallel provider execution and the retry policy
 */

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use multilingo::app_config::TranslationProvider;
use multilingo::errors::{TranslationError, ValidationError};
use multilingo::providers::mock::{MockBehavior, MockProvider};
use multilingo::providers::stub::StubProvider;
use multilingo::translation::{LanguageValidator, Orchestrator, OrchestratorConfig};
use multilingo::{Provider, ServiceConfig, TranslateRequest};

use crate::common::{self, mock_providers};

/// Accepts only texts that start with the target language tag
struct TagValidator;

impl LanguageValidator for TagValidator {
    fn is_valid(&self, text: &str, target_lang: &str) -> Result<(), ValidationError> {
        if text.starts_with(&format!("{}:", target_lang)) {
            Ok(())
        } else {
            Err(ValidationError::LanguageMismatch {
                expected: target_lang.to_string(),
                detected: "de".to_string(),
            })
        }
    }
}

fn request() -> TranslateRequest {
    TranslateRequest::new("Hello world", "en", "fr")
}

async fn execute(orchestrator: &Orchestrator) -> multilingo::translation::OrchestrationOutcome {
    orchestrator
        .execute(&ServiceConfig::default(), &request(), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_execute_withThreeProviders_shouldReportThreeSuccesses() {
    common::init_logging();
    let orchestrator = Orchestrator::new(
        common::providers(vec![
            MockProvider::working("a"),
            MockProvider::working("b"),
            MockProvider::working("c"),
        ]),
        common::fast_config(),
    )
    .unwrap();

    let outcome = execute(&orchestrator).await;

    assert_eq!(outcome.succeeded, 3);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.results.len(), 3);
}

#[tokio::test]
async fn test_execute_withTwoTransientFailures_shouldCallThreeTimes() {
    let flaky = MockProvider::fail_first("flaky", 2);
    let orchestrator =
        Orchestrator::new(common::providers(vec![flaky.clone()]), common::fast_config()).unwrap();

    let outcome = execute(&orchestrator).await;

    assert_eq!(flaky.call_count(), 3);
    assert_eq!(outcome.succeeded, 1);
}

#[tokio::test]
async fn test_execute_withTooManyFailures_shouldReturnLastError() {
    let flaky = MockProvider::fail_first("flaky", 5);
    let orchestrator =
        Orchestrator::new(common::providers(vec![flaky.clone()]), common::fast_config()).unwrap();

    let outcome = execute(&orchestrator).await;

    assert_eq!(flaky.call_count(), 3);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.error_messages()[0].contains("call #3"));
}

/// Counts always add up to the number of providers
#[tokio::test]
async fn test_execute_withMixedProviders_shouldAccountForEveryProvider() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(MockProvider::working("good")),
        Arc::new(MockProvider::failing("bad")),
        Arc::new(MockProvider::new("reporter", MockBehavior::ReportedError)),
        Arc::new(StubProvider::new(TranslationProvider::Amazon)),
        Arc::new(StubProvider::new(TranslationProvider::Doclingo)),
    ];
    let orchestrator = Orchestrator::new(providers, common::fast_config()).unwrap();

    let outcome = execute(&orchestrator).await;

    assert_eq!(outcome.succeeded + outcome.failed, 5);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.errors.len(), 4);
    assert!(
        outcome
            .error_messages()
            .iter()
            .any(|m| m == "[doclingo] Doclingo: Not Implemented Yet")
    );
}

/// Providers run side by side, so wall time follows the slowest one
#[tokio::test]
async fn test_execute_withSlowProviders_shouldRunConcurrently() {
    let orchestrator = Orchestrator::new(
        common::providers(vec![
            MockProvider::slow("a", 200),
            MockProvider::slow("b", 200),
            MockProvider::slow("c", 200),
        ]),
        common::fast_config(),
    )
    .unwrap();

    let started = Instant::now();
    let outcome = execute(&orchestrator).await;

    assert_eq!(outcome.succeeded, 3);
    assert!(started.elapsed() < Duration::from_millis(550));
}

/// Results are ordered by completion, not configuration
#[tokio::test]
async fn test_execute_shouldCollectInCompletionOrder() {
    let orchestrator = Orchestrator::new(
        common::providers(vec![MockProvider::slow("late", 150), MockProvider::slow("early", 1)]),
        common::fast_config(),
    )
    .unwrap();

    let outcome = execute(&orchestrator).await;

    assert_eq!(outcome.first().unwrap().service_name, "early");
}

/// A mismatch on the final attempt still yields a result
#[tokio::test]
async fn test_execute_withWrongLanguage_shouldRetryThenKeepResult() {
    let wrong = MockProvider::wrong_language("chatty");
    let right = MockProvider::working("tidy").with_custom_response(mock_providers::tagged);
    let orchestrator = Orchestrator::new(
        common::providers(vec![wrong.clone(), right.clone()]),
        common::fast_config(),
    )
    .unwrap()
    .with_validator(Arc::new(TagValidator));

    let outcome = execute(&orchestrator).await;

    assert_eq!(wrong.call_count(), 3);
    assert_eq!(right.call_count(), 1);
    assert_eq!(outcome.succeeded, 2);
}

/// An answer that failed validation beats later hard failures
#[tokio::test]
async fn test_execute_withMismatchThenOutage_shouldKeepEarlierResult() {
    let keeper = MockProvider::succeed_first("keeper", 1);
    let orchestrator = Orchestrator::new(common::providers(vec![keeper.clone()]), common::fast_config())
        .unwrap()
        .with_validator(Arc::new(TagValidator));

    let outcome = execute(&orchestrator).await;

    assert_eq!(keeper.call_count(), 3);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.first().unwrap().translated_text, "[keeper:fr] Hello world");
}

/// Language detection switched on through configuration uses the built-in detector
#[tokio::test]
async fn test_execute_withDefaultValidator_shouldRetryWrongLanguageOnly() {
    let wrong = MockProvider::wrong_language("chatty");
    let right = MockProvider::working("tidy").with_custom_response(mock_providers::tagged);
    let config = OrchestratorConfig {
        validate_language: true,
        ..common::fast_config()
    };
    let orchestrator =
        Orchestrator::new(common::providers(vec![wrong.clone(), right.clone()]), config).unwrap();

    let outcome = execute(&orchestrator).await;

    assert!(orchestrator.config().validate_language);
    assert_eq!(wrong.call_count(), 3);
    assert_eq!(right.call_count(), 1);
    assert_eq!(outcome.succeeded, 2);
}

#[tokio::test]
async fn test_execute_withCancellation_shouldInterruptBackoff() {
    let failing = MockProvider::failing("bad");
    let config = OrchestratorConfig {
        retry_delay: Duration::from_secs(30),
        ..common::fast_config()
    };
    let orchestrator = Orchestrator::new(common::providers(vec![failing.clone()]), config).unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = orchestrator
        .execute(&ServiceConfig::default(), &request(), &cancel)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(failing.call_count(), 1);
    assert!(matches!(outcome.errors[0], TranslationError::Cancelled));
}

#[tokio::test]
async fn test_executeWithFallback_shouldReturnFirstSuccess() {
    let orchestrator = Orchestrator::new(
        common::providers(vec![MockProvider::working("a").with_custom_response(mock_providers::tagged)]),
        common::fast_config(),
    )
    .unwrap();

    let result = orchestrator
        .execute_with_fallback(&ServiceConfig::default(), &request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.translated_text, "fr:Hello world");
    assert_eq!(result.confidence, 0.9);
}
