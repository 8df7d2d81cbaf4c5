use anyhow::Result;
use log::debug;

use super::cache::JsonFileCache;
use super::client::WorkSource;
use crate::model::{Relation, Work};

/// Wraps a `WorkSource` with the JSON cache.
///
/// Relation lists are reused from cache only when every listed id also
/// resolves to a cached work; a single missing work invalidates the whole
/// entry and triggers a full refetch, overwriting the cached list and every
/// work it names. Every mutating path ends with a commit.
pub struct CachedWorkService<S> {
    source: S,
    cache: JsonFileCache,
}

impl<S: WorkSource> CachedWorkService<S> {
    pub fn new(source: S, cache: JsonFileCache) -> Self {
        Self { source, cache }
    }

    pub async fn get_seed(&mut self, work_id: &str) -> Result<Work> {
        if let Some(cached) = self.cache.get_work(work_id)? {
            return Ok(cached);
        }
        let work = self.source.fetch_work(work_id).await?;
        self.cache.store_work(&work)?;
        self.cache.commit()?;
        Ok(work)
    }

    pub async fn get_references(&mut self, work_id: &str) -> Result<Vec<Work>> {
        self.get_relation(work_id, Relation::Reference).await
    }

    pub async fn get_citations(&mut self, work_id: &str) -> Result<Vec<Work>> {
        self.get_relation(work_id, Relation::Citation).await
    }

    async fn get_relation(&mut self, work_id: &str, relation: Relation) -> Result<Vec<Work>> {
        let cached_ids = self.cache.relation_ids(work_id, relation)?;
        if !cached_ids.is_empty() {
            let works = self.collect_from_cache(&cached_ids)?;
            if works.len() == cached_ids.len() {
                return Ok(works);
            }
            debug!(
                "Cached {} list for {} resolves {} of {} works; refetching",
                relation,
                work_id,
                works.len(),
                cached_ids.len()
            );
        }

        let works = match relation {
            Relation::Reference => self.source.fetch_references(work_id).await?,
            Relation::Citation => self.source.fetch_citations(work_id).await?,
        };
        self.persist_relation(work_id, relation, &works)?;
        Ok(works)
    }

    fn collect_from_cache(&mut self, work_ids: &[String]) -> Result<Vec<Work>> {
        let mut works = Vec::with_capacity(work_ids.len());
        for work_id in work_ids {
            if let Some(cached) = self.cache.get_work(work_id)? {
                works.push(cached);
            }
        }
        Ok(works)
    }

    fn persist_relation(&mut self, work_id: &str, relation: Relation, works: &[Work]) -> Result<()> {
        let mut ids = Vec::with_capacity(works.len());
        for work in works {
            ids.push(work.openalex_id.clone());
            self.cache.store_work(work)?;
        }
        self.cache.set_relation_ids(work_id, relation, ids)?;
        self.cache.commit()
    }
}
