/*!
 * Placeholder providers for services without a client yet.
 *
 * They are ordinary providers that fail every call with
 * `ProviderError::NotImplemented`, so configuring one simply adds a
 * provider that always reports a failure.
 */

use async_trait::async_trait;

use crate::app_config::TranslationProvider;
use crate::errors::ProviderError;
use crate::providers::{Provider, ProviderResult, ServiceConfig, TranslateRequest};

/// Provider that always fails with "Not Implemented Yet"
#[derive(Debug, Clone)]
pub struct StubProvider {
    kind: TranslationProvider,
    name: String,
}

impl StubProvider {
    /// Create a stub for a service kind
    pub fn new(kind: TranslationProvider) -> Self {
        Self {
            kind,
            name: kind.to_lowercase_string(),
        }
    }

    /// Report failures under a different service name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn not_implemented(&self) -> ProviderError {
        ProviderError::NotImplemented(self.kind.display_name().to_string())
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        _config: &ServiceConfig,
        _request: &TranslateRequest,
    ) -> Result<ProviderResult, ProviderError> {
        Err(self.not_implemented())
    }

    async fn is_available(&self) -> Result<(), ProviderError> {
        Err(self.not_implemented())
    }

    async fn supported_languages(&self) -> Result<Vec<String>, ProviderError> {
        Err(self.not_implemented())
    }
}
