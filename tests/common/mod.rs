/*!
 * Common test utilities for the multilingo test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use multilingo::Provider;
use multilingo::translation::OrchestratorConfig;


/// Route library logs to the test output once
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Orchestrator policy with millisecond back-off and no language detection
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        timeout: Duration::from_secs(5),
        min_successes: 1,
        max_attempts: 3,
        retry_delay: Duration::from_millis(5),
        validate_language: false,
    }
}

/// Erase concrete provider types
pub fn providers<P: Provider + 'static>(items: Vec<P>) -> Vec<Arc<dyn Provider>> {
    items
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn Provider>)
        .collect()
}
