/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use std::time::Duration;

use multilingo::app_config::{Config, LogLevel, ProviderConfig, TranslationProvider};
use multilingo::providers::create_providers;
use multilingo::translation::PipelineOptions;

use crate::common;

/// Test default configuration values
#[test]
fn test_defaultConfig_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, "uk");
    assert_eq!(config.providers.len(), 1);
    assert_eq!(config.providers[0].provider_type, TranslationProvider::Ollama);
    assert_eq!(config.providers[0].endpoint, "http://localhost:11434");
    assert_eq!(config.orchestrator.min_successes, 1);
    assert_eq!(config.fuzzy_threshold, 0.0);
    assert!(config.refiner.is_none());
    assert_eq!(config.log_level, LogLevel::Info);
}

#[test]
fn test_fromFile_withMissingFile_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    assert!(Config::from_file(dir.path().join("absent.json")).is_err());
    Ok(())
}

#[test]
fn test_fromFile_withInvalidJson_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json")?;
    assert!(Config::from_file(path).is_err());
    Ok(())
}

#[test]
fn test_fromFile_withFullConfig_shouldLoadEverySection() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "source_language": "auto",
            "target_language": "de",
            "orchestrator": {"timeout_secs": 10, "min_successes": 2, "retry_delay_ms": 50},
            "providers": [
                {"type": "ollama", "endpoint": "http://gpu-box:11434", "models": ["gemma2:2b"]},
                {"type": "ibm"}
            ],
            "store": {"enabled": false},
            "chunking": {"chunk_size": 800, "context_words": 10},
            "fuzzy_threshold": 0.9,
            "use_glossary": false,
            "refiner": {"model": "phi4:14b"},
            "instructions": "Keep names untranslated",
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::from_file(&path)?;
    tokio_test::assert_ok!(config.validate());

    let orchestrator = config.orchestrator.to_orchestrator_config();
    assert_eq!(orchestrator.timeout, Duration::from_secs(10));
    assert_eq!(orchestrator.min_successes, 2);
    assert_eq!(orchestrator.max_attempts, 3);
    assert_eq!(orchestrator.retry_delay, Duration::from_millis(50));
    assert!(!config.store.enabled);
    assert_eq!(config.refiner.as_ref().map(|r| r.endpoint.as_str()), Some("http://localhost:11434"));
    assert_eq!(config.log_level, LogLevel::Debug);

    let options = PipelineOptions::from(&config);
    assert_eq!(options.chunk_size, 800);
    assert_eq!(options.context_words, 10);
    assert!(!options.use_glossary);
    assert_eq!(options.instructions.as_deref(), Some("Keep names untranslated"));
    Ok(())
}

/// Every configured service becomes a provider, stubs included
#[test]
fn test_createProviders_fromConfig_shouldBuildEveryEntry() {
    let mut config = Config::default();
    config.providers.push(ProviderConfig::new(TranslationProvider::Amazon));
    config.providers.push(ProviderConfig::new(TranslationProvider::Doclingo));

    let providers = create_providers(&config.providers);
    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();

    assert_eq!(names, vec!["ollama", "amazon", "doclingo"]);
}

#[test]
fn test_validate_withUnknownProviderType_shouldFailToParse() {
    let json = r#"{"source_language": "en", "target_language": "fr", "providers": [{"type": "google"}]}"#;
    assert!(serde_json::from_str::<Config>(json).is_err());
}
