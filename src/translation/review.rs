/*!
 * Second-opinion collaborators that run after the orchestrator.
 *
 * An [`Arbiter`] picks or composes the best of several provider outputs and
 * a [`Refiner`] polishes the chosen draft. Both are optional; callers keep
 * the unreviewed draft when either one fails.
 */

use anyhow::Result;
use async_trait::async_trait;

use crate::providers::ProviderResult;

/// Verdict of an [`Arbiter`]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Service whose output was preferred
    pub selected_service: String,
    /// Final text, either one provider's output or a blend of several
    pub composite_text: String,
    /// Whether `composite_text` blends several outputs
    pub is_composite: bool,
    /// Free-text explanation of the choice
    pub reasoning: String,
}

impl Evaluation {
    /// Evaluation that simply takes one provider result
    pub fn select(result: &ProviderResult) -> Self {
        Self {
            selected_service: result.service_name.clone(),
            composite_text: result.translated_text.clone(),
            is_composite: false,
            reasoning: String::new(),
        }
    }
}

/// Selects or composes the best of several translations
#[async_trait]
pub trait Arbiter: Send + Sync {
    async fn evaluate(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
        results: &[ProviderResult],
    ) -> Result<Evaluation>;
}

/// Rewrites a draft translation into more natural prose
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(
        &self,
        source_lang: &str,
        target_lang: &str,
        source_text: &str,
        draft_text: &str,
    ) -> Result<String>;
}
