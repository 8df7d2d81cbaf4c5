pub mod project;
pub mod run;

pub use project::run_project;
pub use run::run_research;
