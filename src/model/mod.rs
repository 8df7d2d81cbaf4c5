use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a related work is cited by the seed (reference) or cites the
/// seed (citation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Reference,
    Citation,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Reference => "reference",
            Relation::Citation => "citation",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance judgment for a work against a research theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scholarly work normalized from an OpenAlex record.
///
/// Identifiers are stored in canonical form (bare id, no URL prefix).
/// Instances are immutable once constructed; the cache overwrites whole
/// records on refetch rather than mutating them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub openalex_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub referenced_works: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub primary_topic: Option<String>,
}

/// A relevance verdict for one work, produced by a relevance agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkDecision {
    pub work: Work,
    pub verdict: Verdict,
    pub justification: String,
    pub relation: Relation,
    /// Display key assigned by the orchestrator after evaluation; empty
    /// until then.
    #[serde(default)]
    pub graph_key: String,
}

/// Role of a node in the citation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Seed,
    Reference,
    Citation,
}

impl From<Relation> for NodeRole {
    fn from(relation: Relation) -> Self {
        match relation {
            Relation::Reference => NodeRole::Reference,
            Relation::Citation => NodeRole::Citation,
        }
    }
}

/// Verdict recorded on a graph node; the seed carries its own marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeVerdict {
    Seed,
    Accepted,
    Rejected,
}

impl From<Verdict> for NodeVerdict {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accepted => NodeVerdict::Accepted,
            Verdict::Rejected => NodeVerdict::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub work_id: String,
    pub title: String,
    pub role: NodeRole,
    pub verdict: NodeVerdict,
}

/// Bipartite citation graph around a single seed work.
///
/// Node keys are unique; edges keep insertion order with duplicates
/// dropped (first occurrence wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationGraph {
    pub seed_key: String,
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: Vec<(String, String)>,
}

/// Outcome of one research run around a seed work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub seed: Work,
    pub theme: String,
    pub accepted: Vec<WorkDecision>,
    pub rejected: Vec<WorkDecision>,
    pub graph: CitationGraph,
}

impl ResearchResult {
    /// All decisions, accepted first, original order preserved within each
    /// group.
    pub fn decisions(&self) -> impl Iterator<Item = &WorkDecision> {
        self.accepted.iter().chain(self.rejected.iter())
    }
}
