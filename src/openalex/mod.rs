pub mod cache;
pub mod client;
pub mod service;

pub use cache::JsonFileCache;
pub use client::{normalize_work_id, OpenAlexClientConfig, OpenAlexHttpClient, WorkSource};
pub use service::CachedWorkService;
