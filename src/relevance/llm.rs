use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::heuristic::HeuristicThemeAgent;
use super::RelevanceAgent;
use crate::model::{Relation, Verdict, Work, WorkDecision};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Best-effort observer of every prompt/response pair sent to the LLM.
/// A returned error is logged at debug level and otherwise discarded;
/// logging must never interrupt classification.
pub type InteractionLogger = Box<dyn Fn(&Work, &Value, &Value) -> Result<()> + Send + Sync>;

pub struct LlmAgentConfig {
    /// Model identifier; falls back to the OPENROUTER_MODEL environment
    /// variable.
    pub model: Option<String>,
    /// API key; falls back to OPENROUTER_API_KEY.
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f64,
    /// Attempts per work before falling back to the heuristic verdict.
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    /// Optional Referer header reported to OpenRouter.
    pub app_url: Option<String>,
    /// Optional X-Title header reported to OpenRouter.
    pub app_title: Option<String>,
}

impl Default for LlmAgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_retries: 2,
            request_timeout_secs: 60,
            app_url: None,
            app_title: None,
        }
    }
}

/// Classifies works with an OpenRouter-hosted LLM, falling back to the
/// heuristic agent's verdict whenever a work cannot be classified.
pub struct LlmThemeAgent {
    http: Client,
    model: String,
    api_key: String,
    base_url: String,
    temperature: f64,
    max_retries: u32,
    timeout: Duration,
    app_url: Option<String>,
    app_title: Option<String>,
    heuristic: HeuristicThemeAgent,
    interaction_logger: Option<InteractionLogger>,
    seed: Option<Work>,
    seed_theme: Option<String>,
}

impl LlmThemeAgent {
    pub fn new(config: LlmAgentConfig) -> Result<Self> {
        let model = config
            .model
            .or_else(|| std::env::var("OPENROUTER_MODEL").ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("LLM relevance agent requires an OpenRouter model identifier"))?;
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("LLM relevance agent requires OPENROUTER_API_KEY"))?;

        Ok(Self {
            http: Client::new(),
            model,
            api_key,
            base_url: config.base_url,
            temperature: config.temperature.max(0.0),
            max_retries: config.max_retries.max(1),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            app_url: config.app_url,
            app_title: config.app_title,
            heuristic: HeuristicThemeAgent,
            interaction_logger: None,
            seed: None,
            seed_theme: None,
        })
    }

    pub fn with_interaction_logger(mut self, logger: InteractionLogger) -> Self {
        self.interaction_logger = Some(logger);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn classify(&self, work: &Work, theme: &str, relation: Relation) -> Result<(Verdict, String)> {
        let messages = self.build_messages(work, theme, relation);
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "relevance_response",
                    "schema": {
                        "type": "object",
                        "properties": {
                            "verdict": {"type": "string", "enum": ["accepted", "rejected"]},
                            "justification": {"type": "string", "minLength": 1}
                        },
                        "required": ["verdict", "justification"],
                        "additionalProperties": false
                    }
                }
            }
        });

        let mut last_error: Option<anyhow::Error> = None;
        for _ in 0..self.max_retries {
            match self.attempt(work, &payload).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => last_error = Some(err),
            }
        }
        Err(anyhow!(
            "LLM classification failed: {}",
            last_error.map(|err| err.to_string()).unwrap_or_default()
        ))
    }

    async fn attempt(&self, work: &Work, payload: &Value) -> Result<(Verdict, String)> {
        let mut request = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .timeout(self.timeout);
        if let Some(app_url) = &self.app_url {
            request = request.header("HTTP-Referer", app_url);
        }
        if let Some(app_title) = &self.app_title {
            request = request.header("X-Title", app_title);
        }

        let response = request
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM request returned an error status")?;
        let raw: Value = response
            .json()
            .await
            .context("Failed to decode LLM response body")?;

        let content = raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        self.log_interaction(work, &payload["messages"], &raw);
        parse_llm_content(&content)
    }

    fn log_interaction(&self, work: &Work, messages: &Value, response: &Value) {
        let Some(logger) = &self.interaction_logger else {
            return;
        };
        if let Err(err) = logger(work, messages, response) {
            debug!(
                "Interaction logger failed for {}: {}",
                work.openalex_id, err
            );
        }
    }

    fn build_messages(&self, work: &Work, theme: &str, relation: Relation) -> Value {
        let author_line = if work.authors.is_empty() {
            "Unknown".to_string()
        } else {
            work.authors.join(", ")
        };
        let mut referenced_summary = work
            .referenced_works
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if work.referenced_works.len() > 5 {
            referenced_summary.push_str(", …");
        }

        let mut user_lines = vec![
            format!("Theme: {}", theme),
            format!("Relation: {}", relation),
            format!("Title: {}", work.title),
            format!(
                "Publication year: {}",
                work.publication_year
                    .map(|year| year.to_string())
                    .unwrap_or_else(|| "Unknown".to_string())
            ),
            format!("Authors: {}", author_line),
        ];
        if let Some(topic) = &work.primary_topic {
            user_lines.push(format!("Primary topic: {}", topic));
        }
        if let Some(abstract_text) = work.abstract_text.as_deref().map(str::trim) {
            if !abstract_text.is_empty() {
                user_lines.push(format!("Abstract: {}", abstract_text));
            }
        }
        if !referenced_summary.is_empty() {
            user_lines.push(format!("Referenced works: {}", referenced_summary));
        }

        if let Some(seed) = &self.seed {
            if !seed.title.is_empty() {
                user_lines.push(format!("Seed title: {}", seed.title));
            }
            if let Some(seed_abstract) = seed.abstract_text.as_deref().map(str::trim) {
                if !seed_abstract.is_empty() {
                    user_lines.push(format!("Seed abstract: {}", seed_abstract));
                }
            }
        }
        if let Some(seed_theme) = &self.seed_theme {
            if seed_theme != theme {
                user_lines.push(format!("Seed theme context: {}", seed_theme));
            }
        }

        let system_prompt = "You are a research assistant evaluating whether scholarly works \
            align with a given theme. Respond with JSON containing a verdict ('accepted' or \
            'rejected') and a concise justification that links the work back to the theme. \
            Prefer conceptual alignment over surface keyword matches.";

        json!([
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_lines.join("\n")}
        ])
    }
}

#[async_trait]
impl RelevanceAgent for LlmThemeAgent {
    fn set_run_context(&mut self, seed: Option<&Work>, theme: Option<&str>) {
        self.seed = seed.cloned();
        self.seed_theme = theme.map(str::to_string);
    }

    async fn evaluate(
        &self,
        works: &[Work],
        theme: &str,
        relation: Relation,
    ) -> Vec<WorkDecision> {
        let fallback_decisions = self.heuristic.evaluate(works, theme, relation).await;
        let fallback: HashMap<&str, &WorkDecision> = fallback_decisions
            .iter()
            .map(|decision| (decision.work.openalex_id.as_str(), decision))
            .collect();

        let mut decisions = Vec::with_capacity(works.len());
        for work in works {
            let (verdict, justification) = match self.classify(work, theme, relation).await {
                Ok(outcome) => outcome,
                Err(err) => match fallback.get(work.openalex_id.as_str()) {
                    Some(fallback) => (
                        fallback.verdict,
                        format!(
                            "Fallback to heuristic: {} (LLM error: {})",
                            fallback.justification, err
                        ),
                    ),
                    None => (
                        Verdict::Rejected,
                        format!("Unable to classify via LLM: {}", err),
                    ),
                },
            };
            decisions.push(WorkDecision {
                work: work.clone(),
                verdict,
                justification,
                relation,
                graph_key: String::new(),
            });
        }
        decisions
    }
}

#[derive(Debug, Deserialize)]
struct LlmVerdictResponse {
    verdict: String,
    justification: String,
}

/// Parse the constrained JSON the model was asked for, tolerating
/// responses wrapped in code-fence markers.
fn parse_llm_content(content: &str) -> Result<(Verdict, String)> {
    let cleaned = strip_code_fences(content);
    let parsed: LlmVerdictResponse =
        serde_json::from_str(cleaned.trim()).context("LLM response is not valid JSON")?;

    let verdict = match parsed.verdict.trim().to_lowercase().as_str() {
        "accepted" => Verdict::Accepted,
        "rejected" => Verdict::Rejected,
        other => bail!("Unexpected verdict from LLM: {}", other),
    };

    let justification = parsed.justification.trim().to_string();
    if justification.is_empty() {
        bail!("LLM justification is empty");
    }

    Ok((verdict, justification))
}

fn strip_code_fences(content: &str) -> String {
    let cleaned = content.trim();
    if !cleaned.starts_with("```") {
        return cleaned.to_string();
    }
    let body = cleaned.splitn(2, '\n').nth(1).unwrap_or("");
    match body.rfind("```") {
        Some(position) => body[..position].to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(id: &str, title: &str) -> Work {
        Work {
            openalex_id: id.to_string(),
            title: title.to_string(),
            publication_year: Some(2020),
            authors: vec!["Grace Hopper".to_string()],
            referenced_works: Vec::new(),
            abstract_text: None,
            primary_topic: None,
        }
    }

    fn unreachable_agent(max_retries: u32) -> LlmThemeAgent {
        // Port 9 (discard) is never listened on; connections are refused
        // immediately, so every classification attempt fails fast.
        LlmThemeAgent::new(LlmAgentConfig {
            model: Some("test-model".to_string()),
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:9/chat/completions".to_string(),
            max_retries,
            request_timeout_secs: 1,
            ..LlmAgentConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_requires_model_and_key() {
        let missing_model = LlmThemeAgent::new(LlmAgentConfig {
            model: Some(String::new()),
            api_key: Some("key".to_string()),
            ..LlmAgentConfig::default()
        });
        assert!(missing_model.is_err());

        let missing_key = LlmThemeAgent::new(LlmAgentConfig {
            model: Some("model".to_string()),
            api_key: Some(String::new()),
            ..LlmAgentConfig::default()
        });
        assert!(missing_key.is_err());
    }

    #[test]
    fn test_parse_llm_content_plain_json() {
        let (verdict, justification) =
            parse_llm_content(r#"{"verdict": "accepted", "justification": "On theme"}"#).unwrap();
        assert_eq!(verdict, Verdict::Accepted);
        assert_eq!(justification, "On theme");
    }

    #[test]
    fn test_parse_llm_content_tolerates_code_fences() {
        let content = "```json\n{\"verdict\": \"rejected\", \"justification\": \"Off theme\"}\n```";
        let (verdict, justification) = parse_llm_content(content).unwrap();
        assert_eq!(verdict, Verdict::Rejected);
        assert_eq!(justification, "Off theme");
    }

    #[test]
    fn test_parse_llm_content_rejects_bad_verdict_and_empty_justification() {
        assert!(parse_llm_content(r#"{"verdict": "maybe", "justification": "x"}"#).is_err());
        assert!(parse_llm_content(r#"{"verdict": "accepted", "justification": "  "}"#).is_err());
        assert!(parse_llm_content("not json").is_err());
    }

    #[tokio::test]
    async fn test_classification_failure_falls_back_to_heuristic() {
        let agent = unreachable_agent(2);
        let works = vec![work("W1", "A Machine Learning Survey")];

        let decisions = agent
            .evaluate(&works, "machine learning", Relation::Reference)
            .await;

        assert_eq!(decisions.len(), 1);
        // Same verdict the heuristic would give, with the fallback noted.
        assert_eq!(decisions[0].verdict, Verdict::Accepted);
        assert!(decisions[0]
            .justification
            .starts_with("Fallback to heuristic:"));
        assert!(decisions[0].justification.contains("LLM error"));
    }

    #[tokio::test]
    async fn test_fallback_keeps_heuristic_rejection() {
        let agent = unreachable_agent(1);
        let works = vec![work("W1", "Organic chemistry basics")];

        let decisions = agent
            .evaluate(&works, "machine learning", Relation::Citation)
            .await;
        assert_eq!(decisions[0].verdict, Verdict::Rejected);
        assert!(decisions[0].justification.contains("Fallback to heuristic"));
    }

    #[test]
    fn test_build_messages_includes_seed_context() {
        let mut agent = unreachable_agent(1);
        let seed = Work {
            abstract_text: Some("Seed abstract text".to_string()),
            ..work("W0", "Seed paper")
        };
        agent.set_run_context(Some(&seed), Some("broader theme"));

        let messages = agent.build_messages(&work("W1", "Candidate"), "narrow theme", Relation::Reference);
        let user_content = messages[1]["content"].as_str().unwrap();
        assert!(user_content.contains("Seed title: Seed paper"));
        assert!(user_content.contains("Seed abstract: Seed abstract text"));
        assert!(user_content.contains("Seed theme context: broader theme"));
        assert!(user_content.contains("Relation: reference"));
    }

    #[test]
    fn test_build_messages_truncates_referenced_works() {
        let agent = unreachable_agent(1);
        let mut candidate = work("W1", "Candidate");
        candidate.referenced_works = (1..=7).map(|n| format!("W{}", n)).collect();

        let messages = agent.build_messages(&candidate, "theme", Relation::Citation);
        let user_content = messages[1]["content"].as_str().unwrap();
        assert!(user_content.contains("W5, …"));
        assert!(!user_content.contains("W6"));
    }
}
