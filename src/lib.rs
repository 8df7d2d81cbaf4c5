pub mod cli;
pub mod commands;
pub mod common;
pub mod graph;
pub mod model;
pub mod openalex;
pub mod orchestrator;
pub mod project;
pub mod relevance;
