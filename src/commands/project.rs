use anyhow::Result;
use log::info;

use crate::cli::ProjectArgs;
use crate::common::setup_logging;
use crate::project::ProjectRepository;

pub fn run_project(args: ProjectArgs) -> Result<()> {
    setup_logging(&args.log_level)?;

    let repository = ProjectRepository::new(&args.projects_root);
    let data = repository.load_project(&args.name)?;

    info!(
        "Project '{}' (slug {}) · theme: {}",
        data.name, data.slug, data.theme
    );
    info!("Runs ({} known, {} loadable):", data.runs.len(), data.results.len());
    for (seed_id, path) in &data.runs {
        let status = if path.exists() { "ok" } else { "missing" };
        info!("  {} -> {:?} [{}]", seed_id, path, status);
    }

    let merged = data.merged_graph();
    info!(
        "Merged graph: {} nodes, {} edges (seed key {})",
        merged.nodes.len(),
        merged.edges.len(),
        merged.seed_key
    );

    Ok(())
}
