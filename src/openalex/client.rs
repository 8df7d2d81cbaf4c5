use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::model::Work;

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";
const DEFAULT_MAILTO: &str = "michael@ufc.br";

/// Source of OpenAlex work records.
///
/// `fetch_references` resolves full records in the order the seed lists
/// them; `fetch_citations` paginates through works that cite the seed.
/// Transport and parse errors propagate uncaught; retries are the
/// caller's concern.
#[async_trait]
pub trait WorkSource {
    async fn fetch_work(&self, work_id: &str) -> Result<Work>;
    async fn fetch_references(&self, work_id: &str) -> Result<Vec<Work>>;
    async fn fetch_citations(&self, work_id: &str) -> Result<Vec<Work>>;
}

/// Configuration for the HTTP client.
pub struct OpenAlexClientConfig {
    pub base_url: String,
    /// Contact email sent with every request; falls back to the
    /// OPENALEX_MAILTO environment variable.
    pub mailto: Option<String>,
    pub timeout_secs: u64,
    /// Works per batched lookup when resolving references.
    pub bulk_page_size: usize,
    /// Results per page when paginating citations.
    pub citation_page_size: usize,
    /// Overall cap on retrieved citations; pagination stops early once
    /// reached, even mid-page.
    pub max_citations: Option<usize>,
}

impl Default for OpenAlexClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            timeout_secs: 30,
            bulk_page_size: 25,
            citation_page_size: 25,
            max_citations: None,
        }
    }
}

/// HTTP client for the public OpenAlex API.
pub struct OpenAlexHttpClient {
    http: Client,
    base_url: String,
    mailto: String,
    timeout: Duration,
    bulk_page_size: usize,
    citation_page_size: usize,
    max_citations: Option<usize>,
}

impl OpenAlexHttpClient {
    pub fn new(config: OpenAlexClientConfig) -> Result<Self> {
        let mailto = config
            .mailto
            .or_else(|| std::env::var("OPENALEX_MAILTO").ok())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MAILTO.to_string());

        Ok(Self {
            http: Client::builder()
                .build()
                .context("Failed to build HTTP client")?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            bulk_page_size: config.bulk_page_size.max(1),
            citation_page_size: config.citation_page_size.max(1),
            max_citations: config.max_citations,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("mailto", self.mailto.clone()));

        let response = self
            .http
            .get(&url)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("OpenAlex request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("OpenAlex returned an error status for {}", url))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode OpenAlex response from {}", url))
    }

    /// Resolve full records for a list of ids using batched lookups.
    ///
    /// Batches can return results in any order; the output is reordered to
    /// match `work_ids`, dropping ids the lookup did not return.
    async fn fetch_many(&self, work_ids: &[String]) -> Result<Vec<Work>> {
        let mut collected: HashMap<String, Work> = HashMap::new();
        for chunk in work_ids.chunks(self.bulk_page_size) {
            let filter = format!("openalex_id:{}", chunk.join("|"));
            let page: ListResponse = self
                .get_json(
                    "/works",
                    &[("filter", filter), ("per-page", chunk.len().to_string())],
                )
                .await?;
            for item in page.results {
                let work = parse_work(item)?;
                collected.insert(work.openalex_id.clone(), work);
            }
        }
        Ok(work_ids
            .iter()
            .filter_map(|id| collected.remove(id))
            .collect())
    }
}

#[async_trait]
impl WorkSource for OpenAlexHttpClient {
    async fn fetch_work(&self, work_id: &str) -> Result<Work> {
        let payload: ApiWork = self.get_json(&format!("/works/{}", work_id), &[]).await?;
        parse_work(payload)
    }

    async fn fetch_references(&self, work_id: &str) -> Result<Vec<Work>> {
        let payload: ApiWork = self
            .get_json(
                &format!("/works/{}", work_id),
                &[("select", "id,referenced_works".to_string())],
            )
            .await?;

        let ref_ids: Vec<String> = payload
            .referenced_works
            .iter()
            .filter(|value| !value.is_empty())
            .map(|value| normalize_work_id(value))
            .collect();
        if ref_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_many(&ref_ids).await
    }

    async fn fetch_citations(&self, work_id: &str) -> Result<Vec<Work>> {
        let mut works: Vec<Work> = Vec::new();
        let mut cursor = Some("*".to_string());

        while let Some(current) = cursor {
            let page: ListResponse = self
                .get_json(
                    "/works",
                    &[
                        ("filter", format!("referenced_works:{}", work_id)),
                        ("per-page", self.citation_page_size.to_string()),
                        ("cursor", current),
                    ],
                )
                .await?;
            if page.results.is_empty() {
                break;
            }
            if append_page(&mut works, page.results, self.max_citations)? {
                return Ok(works);
            }
            cursor = page.meta.next_cursor.filter(|c| !c.is_empty());
        }
        Ok(works)
    }
}

/// Append one page of results, honoring the overall cap. Returns true when
/// the cap was reached and pagination should stop.
fn append_page(works: &mut Vec<Work>, results: Vec<ApiWork>, cap: Option<usize>) -> Result<bool> {
    for item in results {
        works.push(parse_work(item)?);
        if let Some(cap) = cap {
            if works.len() >= cap {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[derive(Debug, Default, Deserialize)]
struct ApiWork {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publication_year: Option<Value>,
    #[serde(default)]
    authorships: Vec<ApiAuthorship>,
    #[serde(default)]
    referenced_works: Vec<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<Value>>>,
    #[serde(default)]
    primary_topic: Option<ApiTopic>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAuthorship {
    #[serde(default)]
    author: Option<ApiAuthor>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAuthor {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiTopic {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<ApiWork>,
    #[serde(default)]
    meta: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Reduce an external identifier to the bare id after the last path
/// separator (a full URL collapses to its trailing segment).
pub fn normalize_work_id(value: &str) -> String {
    match value.rsplit_once('/') {
        Some((_, tail)) => tail.to_string(),
        None => value.to_string(),
    }
}

fn parse_work(payload: ApiWork) -> Result<Work> {
    let openalex_id = normalize_work_id(payload.id.as_deref().unwrap_or(""));
    if openalex_id.is_empty() {
        bail!("OpenAlex record is missing an identifier");
    }

    let referenced_works = payload
        .referenced_works
        .iter()
        .filter(|value| !value.is_empty())
        .map(|value| normalize_work_id(value))
        .collect();

    Ok(Work {
        openalex_id,
        title: payload.title.unwrap_or_default(),
        publication_year: coerce_year(payload.publication_year.as_ref()),
        authors: extract_authors(&payload.authorships),
        referenced_works,
        abstract_text: payload
            .abstract_inverted_index
            .as_ref()
            .and_then(reconstruct_abstract),
        primary_topic: payload
            .primary_topic
            .and_then(|topic| topic.display_name)
            .filter(|name| !name.is_empty()),
    })
}

/// Publication year coercion: integer or numeric string, anything else is
/// treated as unknown.
fn coerce_year(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(number) => number.as_i64().and_then(|year| i32::try_from(year).ok()),
        Value::String(text) => text.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn extract_authors(authorships: &[ApiAuthorship]) -> Vec<String> {
    authorships
        .iter()
        .filter_map(|entry| entry.author.as_ref())
        .filter_map(|author| author.display_name.as_deref())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rebuild abstract text from OpenAlex's word -> positions inverted index:
/// invert to position -> word, sort by position, join with single spaces.
/// Absent or malformed input yields no abstract.
fn reconstruct_abstract(inverted: &HashMap<String, Vec<Value>>) -> Option<String> {
    let mut positions: BTreeMap<i64, &str> = BTreeMap::new();
    for (word, indexes) in inverted {
        for index in indexes {
            let position = match index {
                Value::Number(number) => number.as_i64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            };
            if let Some(position) = position {
                positions.insert(position, word.as_str());
            }
        }
    }
    if positions.is_empty() {
        return None;
    }
    Some(positions.values().copied().collect::<Vec<_>>().join(" "))
}
