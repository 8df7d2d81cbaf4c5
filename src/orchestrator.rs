use anyhow::Result;

use crate::graph::{CitationGraphBuilder, GraphKeyGenerator};
use crate::model::{Relation, ResearchResult, Verdict, Work};
use crate::openalex::{CachedWorkService, WorkSource};
use crate::relevance::RelevanceAgent;

/// Composes the cached service, relevance agent, key generator and graph
/// builder into one research run.
///
/// Pure orchestration: no retry logic of its own, retries belong to the
/// HTTP client's callers and the LLM agent.
pub struct ResearchOrchestrator<S> {
    service: CachedWorkService<S>,
    agent: Box<dyn RelevanceAgent + Send>,
    key_generator: GraphKeyGenerator,
    graph_builder: CitationGraphBuilder,
}

impl<S: WorkSource> ResearchOrchestrator<S> {
    pub fn new(service: CachedWorkService<S>, agent: Box<dyn RelevanceAgent + Send>) -> Self {
        Self {
            service,
            agent,
            key_generator: GraphKeyGenerator,
            graph_builder: CitationGraphBuilder,
        }
    }

    pub async fn run(&mut self, seed_id: &str, theme: &str) -> Result<ResearchResult> {
        let seed = self.service.get_seed(seed_id).await?;
        let references = self.service.get_references(seed_id).await?;
        let citations = self.service.get_citations(seed_id).await?;

        // Keys are assigned over the combined list in fetch order: seed,
        // references, citations.
        let mut all_works: Vec<&Work> =
            Vec::with_capacity(1 + references.len() + citations.len());
        all_works.push(&seed);
        all_works.extend(references.iter());
        all_works.extend(citations.iter());
        let keys = self.key_generator.assign_keys(all_works);

        // Contextual hint only; agents may ignore it.
        self.agent.set_run_context(Some(&seed), Some(theme));

        let mut decisions = self
            .agent
            .evaluate(&references, theme, Relation::Reference)
            .await;
        decisions.extend(
            self.agent
                .evaluate(&citations, theme, Relation::Citation)
                .await,
        );

        for decision in &mut decisions {
            decision.graph_key = keys
                .get(&decision.work.openalex_id)
                .cloned()
                .unwrap_or_else(|| decision.work.openalex_id.clone());
        }

        let graph = self.graph_builder.build(&seed, &decisions, &keys);

        let (accepted, rejected): (Vec<_>, Vec<_>) = decisions
            .into_iter()
            .partition(|decision| decision.verdict == Verdict::Accepted);

        Ok(ResearchResult {
            seed,
            theme: theme.to_string(),
            accepted,
            rejected,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openalex::JsonFileCache;
    use crate::relevance::HeuristicThemeAgent;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedSource {
        seed: Work,
        references: Vec<Work>,
        citations: Vec<Work>,
    }

    #[async_trait]
    impl WorkSource for FixedSource {
        async fn fetch_work(&self, _work_id: &str) -> Result<Work> {
            Ok(self.seed.clone())
        }

        async fn fetch_references(&self, _work_id: &str) -> Result<Vec<Work>> {
            Ok(self.references.clone())
        }

        async fn fetch_citations(&self, _work_id: &str) -> Result<Vec<Work>> {
            Ok(self.citations.clone())
        }
    }

    fn work(id: &str, title: &str, author: &str, year: i32) -> Work {
        Work {
            openalex_id: id.to_string(),
            title: title.to_string(),
            publication_year: Some(year),
            authors: vec![author.to_string()],
            referenced_works: Vec::new(),
            abstract_text: None,
            primary_topic: None,
        }
    }

    fn orchestrator(dir: &std::path::Path) -> ResearchOrchestrator<FixedSource> {
        let source = FixedSource {
            seed: work("W0", "Citation graphs in practice", "Ada Seed", 2020),
            references: vec![
                work("W1", "A machine learning survey", "Jane Smith", 2019),
                work("W2", "Organic chemistry basics", "John Roe", 2018),
            ],
            citations: vec![work(
                "W3",
                "Machine learning for citations",
                "Alex Doe",
                2022,
            )],
        };
        let cache = JsonFileCache::new(dir.join("cache.json"));
        ResearchOrchestrator::new(
            CachedWorkService::new(source, cache),
            Box::new(HeuristicThemeAgent),
        )
    }

    #[tokio::test]
    async fn test_run_partitions_and_keys_decisions() {
        let dir = tempdir().unwrap();
        let mut orchestrator = orchestrator(dir.path());

        let result = orchestrator.run("W0", "machine learning").await.unwrap();

        assert_eq!(result.theme, "machine learning");
        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.accepted[0].work.openalex_id, "W1");
        assert_eq!(result.accepted[1].work.openalex_id, "W3");
        assert_eq!(result.rejected[0].work.openalex_id, "W2");

        for decision in result.decisions() {
            assert!(!decision.graph_key.is_empty());
        }
        assert_eq!(result.accepted[0].graph_key, "Smith2019");
    }

    #[tokio::test]
    async fn test_run_builds_graph_around_seed() {
        let dir = tempdir().unwrap();
        let mut orchestrator = orchestrator(dir.path());

        let result = orchestrator.run("W0", "machine learning").await.unwrap();
        let graph = &result.graph;

        assert_eq!(graph.seed_key, "Seed2020");
        assert_eq!(graph.nodes.len(), 4);
        assert!(graph
            .edges
            .contains(&("Seed2020".to_string(), "Smith2019".to_string())));
        assert!(graph
            .edges
            .contains(&("Doe2022".to_string(), "Seed2020".to_string())));
    }
}
