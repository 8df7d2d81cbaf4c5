use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization;

use crate::model::{CitationGraph, GraphNode, ResearchResult};

lazy_static! {
    static ref SLUG_SEPARATOR: Regex = Regex::new(r"[^a-zA-Z0-9]+").unwrap();
    static ref UNSAFE_FILENAME: Regex = Regex::new(r"[^a-zA-Z0-9_.-]+").unwrap();
}

/// Project identity stamped into every run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub slug: String,
}

/// One persisted research run: the full result plus project identity and
/// a generation timestamp (ISO-8601 UTC, second precision).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(flatten)]
    pub result: ResearchResult,
    pub project: ProjectInfo,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    name: String,
    slug: String,
    theme: String,
    #[serde(default)]
    runs: BTreeMap<String, RunEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunEntry {
    seed_id: String,
    run_file: String,
    updated_at: String,
}

/// Loaded view of a project: manifest fields plus whatever run files
/// still resolve on disk. `runs` lists every known run path, including
/// missing ones, for diagnostics.
#[derive(Debug)]
pub struct ProjectData {
    pub name: String,
    pub slug: String,
    pub theme: String,
    pub manifest_path: PathBuf,
    pub runs: BTreeMap<String, PathBuf>,
    pub results: Vec<RunRecord>,
}

impl ProjectData {
    /// Union of all per-run graphs: first writer wins on node key
    /// collisions, edges deduplicated project-wide, and the merged seed
    /// key set to the project slug.
    pub fn merged_graph(&self) -> CitationGraph {
        merge_graphs(self.results.iter().map(|record| &record.result.graph), &self.slug)
    }
}

/// Persists research runs under per-project manifests.
///
/// A project's theme is immutable after the first successful run; saving
/// a run with a different theme fails before anything is written.
pub struct ProjectRepository {
    root: PathBuf,
}

impl ProjectRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save_run(&self, project: &str, result: &ResearchResult) -> Result<PathBuf> {
        let slug = slugify(project);
        let project_dir = self.root.join(&slug);
        let runs_dir = project_dir.join("runs");
        fs::create_dir_all(&runs_dir)
            .with_context(|| format!("Failed to create runs directory {:?}", runs_dir))?;

        let manifest_path = project_dir.join("project.json");
        let mut manifest = match load_manifest(&manifest_path)? {
            Some(existing) => {
                if !existing.theme.is_empty() && existing.theme != result.theme {
                    bail!(
                        "Project theme mismatch: existing theme is '{}' but run was executed with '{}'",
                        existing.theme,
                        result.theme
                    );
                }
                existing
            }
            None => Manifest {
                name: project.to_string(),
                slug: slug.clone(),
                theme: result.theme.clone(),
                runs: BTreeMap::new(),
            },
        };

        let run_filename = format!("{}.json", sanitize_filename(&result.seed.openalex_id));
        let run_path = runs_dir.join(&run_filename);

        let record = RunRecord {
            result: result.clone(),
            project: ProjectInfo {
                name: project.to_string(),
                slug: slug.clone(),
            },
            generated_at: utc_now_iso()?,
        };
        let json =
            serde_json::to_string_pretty(&record).context("Failed to serialize run record")?;
        fs::write(&run_path, json)
            .with_context(|| format!("Failed to write run file {:?}", run_path))?;

        manifest.runs.insert(
            result.seed.openalex_id.clone(),
            RunEntry {
                seed_id: result.seed.openalex_id.clone(),
                run_file: format!("runs/{}", run_filename),
                updated_at: utc_now_iso()?,
            },
        );

        let json =
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        fs::write(&manifest_path, json)
            .with_context(|| format!("Failed to write manifest {:?}", manifest_path))?;

        Ok(run_path)
    }

    pub fn load_project(&self, project: &str) -> Result<ProjectData> {
        let slug = slugify(project);
        let project_dir = self.root.join(&slug);
        let manifest_path = project_dir.join("project.json");
        let manifest = load_manifest(&manifest_path)?
            .ok_or_else(|| anyhow!("Project '{}' not found at {:?}", project, manifest_path))?;

        let mut runs: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut results: Vec<RunRecord> = Vec::new();
        for (seed_id, entry) in &manifest.runs {
            let path = project_dir.join(&entry.run_file);
            runs.insert(seed_id.clone(), path.clone());
            if !path.exists() {
                // Manifest entries can outlive their run files; skip.
                continue;
            }
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read run file {:?}", path))?;
            let record: RunRecord = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse run file {:?}", path))?;
            results.push(record);
        }

        Ok(ProjectData {
            name: manifest.name,
            slug: manifest.slug,
            theme: manifest.theme,
            manifest_path,
            runs,
            results,
        })
    }
}

fn load_manifest(path: &Path) -> Result<Option<Manifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {:?}", path))?;
    let manifest = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse manifest {:?}", path))?;
    Ok(Some(manifest))
}

/// Filesystem-safe slug: Unicode-fold to ASCII, collapse non-alphanumeric
/// runs to single hyphens, lowercase; empty results become "project".
pub fn slugify(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let slug = SLUG_SEPARATOR.replace_all(&ascii, "-");
    let slug = slug.trim_matches('-').to_lowercase();
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

fn sanitize_filename(identifier: &str) -> String {
    let safe = UNSAFE_FILENAME.replace_all(identifier, "_");
    let trimmed = safe.trim_matches(|ch| ch == '_' || ch == '.');
    if trimmed.is_empty() {
        "openalex_run".to_string()
    } else {
        trimmed.to_string()
    }
}

fn utc_now_iso() -> Result<String> {
    let now = OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .context("Failed to truncate timestamp")?;
    now.format(&Rfc3339).context("Failed to format timestamp")
}

fn merge_graphs<'a, I>(graphs: I, seed_key: &str) -> CitationGraph
where
    I: IntoIterator<Item = &'a CitationGraph>,
{
    let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for graph in graphs {
        for (key, node) in &graph.nodes {
            nodes.entry(key.clone()).or_insert_with(|| node.clone());
        }
        for edge in &graph.edges {
            if seen.insert(edge.clone()) {
                edges.push(edge.clone());
            }
        }
    }

    CitationGraph {
        seed_key: seed_key.to_string(),
        nodes,
        edges,
    }
}
