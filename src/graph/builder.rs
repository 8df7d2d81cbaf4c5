use std::collections::{BTreeMap, HashSet};

use crate::model::{CitationGraph, GraphNode, NodeRole, NodeVerdict, Relation, Work, WorkDecision};

/// Builds the citation graph for one run: a seed node plus one node per
/// decision.
///
/// Edge direction encodes the citation semantics: the seed cites its
/// references (seed -> reference) and is cited by its citations
/// (citation -> seed). Duplicate edges keep their first occurrence only.
#[derive(Debug, Default)]
pub struct CitationGraphBuilder;

impl CitationGraphBuilder {
    pub fn build(
        &self,
        seed: &Work,
        decisions: &[WorkDecision],
        keys: &std::collections::HashMap<String, String>,
    ) -> CitationGraph {
        let seed_key = keys
            .get(&seed.openalex_id)
            .cloned()
            .unwrap_or_else(|| seed.openalex_id.clone());

        let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
        nodes.insert(
            seed_key.clone(),
            GraphNode {
                work_id: seed.openalex_id.clone(),
                title: seed.title.clone(),
                role: NodeRole::Seed,
                verdict: NodeVerdict::Seed,
            },
        );

        let mut edges: Vec<(String, String)> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for decision in decisions {
            let key = decision.graph_key.clone();
            nodes.insert(
                key.clone(),
                GraphNode {
                    work_id: decision.work.openalex_id.clone(),
                    title: decision.work.title.clone(),
                    role: decision.relation.into(),
                    verdict: decision.verdict.into(),
                },
            );
            let edge = match decision.relation {
                Relation::Reference => (seed_key.clone(), key),
                Relation::Citation => (key, seed_key.clone()),
            };
            if seen.insert(edge.clone()) {
                edges.push(edge);
            }
        }

        CitationGraph {
            seed_key,
            nodes,
            edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;
    use std::collections::HashMap;

    fn work(id: &str, title: &str) -> Work {
        Work {
            openalex_id: id.to_string(),
            title: title.to_string(),
            publication_year: None,
            authors: Vec::new(),
            referenced_works: Vec::new(),
            abstract_text: None,
            primary_topic: None,
        }
    }

    fn decision(id: &str, key: &str, relation: Relation, verdict: Verdict) -> WorkDecision {
        WorkDecision {
            work: work(id, id),
            verdict,
            justification: "test".to_string(),
            relation,
            graph_key: key.to_string(),
        }
    }

    fn seed_keys() -> HashMap<String, String> {
        let mut keys = HashMap::new();
        keys.insert("W0".to_string(), "Seed2020".to_string());
        keys
    }

    #[test]
    fn test_edge_direction_by_relation() {
        let builder = CitationGraphBuilder;
        let decisions = vec![
            decision("W1", "Ref2019", Relation::Reference, Verdict::Accepted),
            decision("W2", "Cit2022", Relation::Citation, Verdict::Rejected),
        ];
        let graph = builder.build(&work("W0", "Seed"), &decisions, &seed_keys());

        assert_eq!(graph.seed_key, "Seed2020");
        assert_eq!(
            graph.edges,
            vec![
                ("Seed2020".to_string(), "Ref2019".to_string()),
                ("Cit2022".to_string(), "Seed2020".to_string()),
            ]
        );
        assert_eq!(graph.nodes["Ref2019"].role, NodeRole::Reference);
        assert_eq!(graph.nodes["Cit2022"].verdict, NodeVerdict::Rejected);
        assert_eq!(graph.nodes["Seed2020"].verdict, NodeVerdict::Seed);
    }

    #[test]
    fn test_duplicate_edges_keep_first_occurrence() {
        let builder = CitationGraphBuilder;
        let decisions = vec![
            decision("W1", "Dup2020", Relation::Reference, Verdict::Accepted),
            decision("W1", "Dup2020", Relation::Reference, Verdict::Accepted),
            decision("W2", "Cit2022", Relation::Citation, Verdict::Accepted),
        ];
        let graph = builder.build(&work("W0", "Seed"), &decisions, &seed_keys());

        assert_eq!(graph.edges.len(), 2);
        assert_eq!(
            graph.edges[0],
            ("Seed2020".to_string(), "Dup2020".to_string())
        );
    }

    #[test]
    fn test_seed_only_graph() {
        let builder = CitationGraphBuilder;
        let graph = builder.build(&work("W0", "Seed"), &[], &seed_keys());
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
