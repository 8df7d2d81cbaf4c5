use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "openalex-citation-research")]
#[command(about = "Collect references/citations from OpenAlex and score them against a research theme")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a research pass around a seed work and classify related works
    Run(RunArgs),

    /// Inspect a saved project: run inventory and merged citation graph
    Project(ProjectArgs),
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// OpenAlex work identifier (e.g. W2002097905)
    pub seed: String,

    /// Research theme used to evaluate related works
    pub theme: String,

    /// Path to the JSON cache file
    #[arg(long, default_value = "data/openalex_cache.json")]
    pub cache: String,

    /// Email reported to OpenAlex (defaults to OPENALEX_MAILTO env)
    #[arg(long)]
    pub mailto: Option<String>,

    /// Maximum number of citing works to retrieve
    #[arg(long, default_value = "50")]
    pub max_citations: usize,

    /// Results per request when pulling citations
    #[arg(long, default_value = "50")]
    pub citation_page_size: usize,

    /// OpenRouter model identifier for relevance decisions (defaults to OPENROUTER_MODEL env)
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Temperature for the LLM classifier
    #[arg(long, default_value = "0.0")]
    pub llm_temperature: f64,

    /// Retries for LLM classification before falling back
    #[arg(long, default_value = "2")]
    pub llm_max_retries: u32,

    /// Optional Referer header reported to OpenRouter
    #[arg(long)]
    pub llm_app_url: Option<String>,

    /// Optional X-Title header reported to OpenRouter
    #[arg(long)]
    pub llm_app_title: Option<String>,

    /// Disable the LLM classifier and use heuristic matching only
    #[arg(long)]
    pub no_llm: bool,

    /// Persist the run under this project name
    #[arg(long)]
    pub project: Option<String>,

    /// Root directory for project manifests
    #[arg(long, default_value = "data/projects")]
    pub projects_root: String,

    /// Logging level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}

#[derive(Parser, Clone)]
pub struct ProjectArgs {
    /// Project name (or slug) to inspect
    pub name: String,

    /// Root directory for project manifests
    #[arg(long, default_value = "data/projects")]
    pub projects_root: String,

    /// Logging level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, default_value = "INFO")]
    pub log_level: String,
}
