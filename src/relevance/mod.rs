pub mod heuristic;
pub mod llm;

use async_trait::async_trait;

use crate::model::{Relation, Work, WorkDecision};

pub use heuristic::HeuristicThemeAgent;
pub use llm::{InteractionLogger, LlmAgentConfig, LlmThemeAgent};

/// Strategy for judging works against a research theme.
///
/// Implementations never fail a batch: classification problems are
/// resolved per work (fallback verdicts carry an explanation in their
/// justification).
#[async_trait]
pub trait RelevanceAgent {
    /// Contextual hints for the run. Purely best-effort; implementations
    /// may ignore them and callers must not depend on any side effect.
    fn set_run_context(&mut self, _seed: Option<&Work>, _theme: Option<&str>) {}

    async fn evaluate(&self, works: &[Work], theme: &str, relation: Relation)
        -> Vec<WorkDecision>;
}
