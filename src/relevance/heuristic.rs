use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::RelevanceAgent;
use crate::model::{Relation, Verdict, Work, WorkDecision};

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[a-z0-9]+").unwrap();
}

/// Lowercase, strip diacritics, and split into ASCII alphanumeric tokens.
pub fn extract_tokens(text: &str) -> Vec<String> {
    let folded: String = text
        .to_lowercase()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect();
    TOKEN_PATTERN
        .find_iter(&folded)
        .map(|token| token.as_str().to_string())
        .collect()
}

/// Keyword-overlap relevance agent.
///
/// Scans title, then abstract, then primary topic, accepting on the first
/// field that contains any theme token. Used standalone and as the LLM
/// agent's fallback.
#[derive(Debug, Default, Clone)]
pub struct HeuristicThemeAgent;

impl HeuristicThemeAgent {
    fn prepare_theme(theme: &str) -> Vec<String> {
        let unique: BTreeSet<String> = extract_tokens(theme).into_iter().collect();
        unique.into_iter().collect()
    }

    fn score_work(work: &Work, tokens: &[String]) -> (Verdict, String) {
        if tokens.is_empty() {
            return (
                Verdict::Accepted,
                "No theme keywords provided; defaulting to acceptance".to_string(),
            );
        }

        let fields = [
            ("title", work.title.as_str()),
            ("abstract", work.abstract_text.as_deref().unwrap_or("")),
            ("primary_topic", work.primary_topic.as_deref().unwrap_or("")),
        ];

        for (field_name, content) in fields {
            let content_tokens: HashSet<String> = extract_tokens(content).into_iter().collect();
            if let Some(keyword) = tokens.iter().find(|token| content_tokens.contains(*token)) {
                return (
                    Verdict::Accepted,
                    format!("Matches theme keyword '{}' in {}", keyword, field_name),
                );
            }
        }

        (
            Verdict::Rejected,
            format!(
                "No theme keyword match found (expected one of: {})",
                tokens.join(", ")
            ),
        )
    }
}

#[async_trait]
impl RelevanceAgent for HeuristicThemeAgent {
    async fn evaluate(
        &self,
        works: &[Work],
        theme: &str,
        relation: Relation,
    ) -> Vec<WorkDecision> {
        let tokens = Self::prepare_theme(theme);
        works
            .iter()
            .map(|work| {
                let (verdict, justification) = Self::score_work(work, &tokens);
                WorkDecision {
                    work: work.clone(),
                    verdict,
                    justification,
                    relation,
                    graph_key: String::new(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(title: &str, abstract_text: Option<&str>, topic: Option<&str>) -> Work {
        Work {
            openalex_id: "W1".to_string(),
            title: title.to_string(),
            publication_year: None,
            authors: Vec::new(),
            referenced_works: Vec::new(),
            abstract_text: abstract_text.map(str::to_string),
            primary_topic: topic.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_tokens_folds_diacritics() {
        assert_eq!(
            extract_tokens("Aprendizagem de Máquina"),
            vec!["aprendizagem", "de", "maquina"]
        );
        assert_eq!(extract_tokens("Self-Attention!"), vec!["self", "attention"]);
    }

    #[tokio::test]
    async fn test_title_match_accepts_and_names_field() {
        let agent = HeuristicThemeAgent;
        let works = vec![work("A Machine Learning Survey", None, None)];
        let decisions = agent
            .evaluate(&works, "machine learning", Relation::Reference)
            .await;

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].verdict, Verdict::Accepted);
        // Theme tokens are deduplicated and sorted, so "learning" is
        // checked before "machine".
        assert!(decisions[0].justification.contains("'learning'"));
        assert!(decisions[0].justification.contains("title"));
    }

    #[tokio::test]
    async fn test_field_priority_title_before_abstract() {
        let agent = HeuristicThemeAgent;
        let works = vec![work(
            "Unrelated title",
            Some("Graph neural networks for citation analysis"),
            Some("Machine Learning"),
        )];
        let decisions = agent.evaluate(&works, "citation", Relation::Citation).await;
        assert_eq!(decisions[0].verdict, Verdict::Accepted);
        assert!(decisions[0].justification.contains("abstract"));
    }

    #[tokio::test]
    async fn test_no_match_rejects_and_lists_expected_tokens() {
        let agent = HeuristicThemeAgent;
        let works = vec![work("Organic chemistry basics", None, None)];
        let decisions = agent
            .evaluate(&works, "machine learning", Relation::Reference)
            .await;

        assert_eq!(decisions[0].verdict, Verdict::Rejected);
        assert!(decisions[0]
            .justification
            .contains("expected one of: learning, machine"));
    }

    #[tokio::test]
    async fn test_empty_theme_accepts_everything() {
        let agent = HeuristicThemeAgent;
        let works = vec![work("Anything at all", None, None)];
        let decisions = agent.evaluate(&works, "!!!", Relation::Reference).await;
        assert_eq!(decisions[0].verdict, Verdict::Accepted);
        assert!(decisions[0].justification.contains("defaulting"));
    }
}
