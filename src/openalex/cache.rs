use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::model::{Relation, Work};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheData {
    #[serde(default)]
    works: BTreeMap<String, Work>,
    #[serde(default)]
    references: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    citations: BTreeMap<String, Vec<String>>,
}

/// On-disk JSON memoization of works and relation id-lists.
///
/// The file is read at most once per instance lifetime. Writes are
/// deferred until `commit`, which rewrites the whole file only when
/// something changed since the last commit.
pub struct JsonFileCache {
    path: PathBuf,
    data: Option<CacheData>,
    dirty: bool,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: None,
            dirty: false,
        }
    }

    fn load(&mut self) -> Result<&mut CacheData> {
        if self.data.is_none() {
            let data = if self.path.exists() {
                let text = fs::read_to_string(&self.path)
                    .with_context(|| format!("Failed to read cache file {:?}", self.path))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse cache file {:?}", self.path))?
            } else {
                CacheData::default()
            };
            self.data = Some(data);
        }
        Ok(self.data.get_or_insert_with(CacheData::default))
    }

    pub fn get_work(&mut self, work_id: &str) -> Result<Option<Work>> {
        Ok(self.load()?.works.get(work_id).cloned())
    }

    pub fn store_work(&mut self, work: &Work) -> Result<()> {
        self.load()?
            .works
            .insert(work.openalex_id.clone(), work.clone());
        self.dirty = true;
        Ok(())
    }

    /// Ordered id-list cached for a seed's relation, empty when absent.
    pub fn relation_ids(&mut self, seed_id: &str, relation: Relation) -> Result<Vec<String>> {
        let data = self.load()?;
        let bucket = match relation {
            Relation::Reference => &data.references,
            Relation::Citation => &data.citations,
        };
        Ok(bucket.get(seed_id).cloned().unwrap_or_default())
    }

    pub fn set_relation_ids(
        &mut self,
        seed_id: &str,
        relation: Relation,
        ids: Vec<String>,
    ) -> Result<()> {
        let data = self.load()?;
        let bucket = match relation {
            Relation::Reference => &mut data.references,
            Relation::Citation => &mut data.citations,
        };
        bucket.insert(seed_id.to_string(), ids);
        self.dirty = true;
        Ok(())
    }

    /// Write the cache back to disk if anything changed since the last
    /// commit.
    pub fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(self.load()?)
            .context("Failed to serialize cache")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
            }
        }
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache file {:?}", self.path))?;
        self.dirty = false;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
}
