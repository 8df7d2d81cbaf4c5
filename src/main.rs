use anyhow::Result;
use clap::Parser;

use openalex_citation_research::cli::{Cli, Commands};
use openalex_citation_research::commands::{run_project, run_research};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_research(args)?;
        }
        Commands::Project(args) => {
            run_project(args)?;
        }
    }

    Ok(())
}
