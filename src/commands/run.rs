use anyhow::Result;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cli::RunArgs;
use crate::common::setup_logging;
use crate::model::ResearchResult;
use crate::openalex::{CachedWorkService, JsonFileCache, OpenAlexClientConfig, OpenAlexHttpClient};
use crate::orchestrator::ResearchOrchestrator;
use crate::project::ProjectRepository;
use crate::relevance::{HeuristicThemeAgent, LlmAgentConfig, LlmThemeAgent, RelevanceAgent};

pub fn run_research(args: RunArgs) -> Result<()> {
    setup_logging(&args.log_level)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_research_async(args))
}

async fn run_research_async(args: RunArgs) -> Result<()> {
    let client = OpenAlexHttpClient::new(OpenAlexClientConfig {
        mailto: args.mailto.clone(),
        citation_page_size: args.citation_page_size,
        max_citations: Some(args.max_citations),
        ..OpenAlexClientConfig::default()
    })?;
    let cache = JsonFileCache::new(&args.cache);
    let service = CachedWorkService::new(client, cache);
    let agent = resolve_relevance_agent(&args);
    let mut orchestrator = ResearchOrchestrator::new(service, agent);

    let result = orchestrator.run(&args.seed, &args.theme).await?;
    render_summary(&result);

    if let Some(project) = &args.project {
        let repository = ProjectRepository::new(&args.projects_root);
        let run_path = repository.save_run(project, &result)?;
        info!("Saved run to {:?}", run_path);
    }

    Ok(())
}

fn resolve_relevance_agent(args: &RunArgs) -> Box<dyn RelevanceAgent + Send> {
    if args.no_llm {
        info!("Using heuristic relevance agent (LLM disabled)");
        return Box::new(HeuristicThemeAgent);
    }

    let config = LlmAgentConfig {
        model: args.llm_model.clone(),
        temperature: args.llm_temperature,
        max_retries: args.llm_max_retries,
        app_url: args.llm_app_url.clone(),
        app_title: args.llm_app_title.clone(),
        ..LlmAgentConfig::default()
    };

    match LlmThemeAgent::new(config) {
        Ok(agent) => {
            info!(
                "Using LLM relevance agent with model '{}' (temperature={})",
                agent.model(),
                args.llm_temperature
            );
            let call_count = AtomicUsize::new(0);
            Box::new(agent.with_interaction_logger(Box::new(
                move |work, messages, response| {
                    let request_number = call_count.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(
                        "LLM request #{} for {} ({})",
                        request_number, work.openalex_id, work.title
                    );
                    debug!("  request: {}", shorten(&messages.to_string(), 600));
                    let content = response
                        .pointer("/choices/0/message/content")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    info!("  response: {}", shorten(content, 400));
                    Ok(())
                },
            )))
        }
        Err(err) => {
            warn!("{}; falling back to heuristic relevance agent", err);
            Box::new(HeuristicThemeAgent)
        }
    }
}

fn render_summary(result: &ResearchResult) {
    info!("Seed: {} ({})", result.seed.openalex_id, result.seed.title);
    info!("Theme: {}", result.theme);
    info!(
        "Accepted {} works, rejected {}",
        result.accepted.len(),
        result.rejected.len()
    );
    info!(
        "Graph: {} nodes, {} edges (seed key {})",
        result.graph.nodes.len(),
        result.graph.edges.len(),
        result.graph.seed_key
    );
    for decision in result.decisions() {
        info!(
            "  [{}] {} {}: {}",
            decision.verdict, decision.graph_key, decision.work.title, decision.justification
        );
    }
}

fn shorten(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    format!("{}…", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_leaves_short_text_alone() {
        assert_eq!(shorten("  short  ", 10), "short");
    }

    #[test]
    fn test_shorten_truncates_with_ellipsis() {
        let shortened = shorten("abcdefghij", 5);
        assert_eq!(shortened, "abcd…");
    }
}
