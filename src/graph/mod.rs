pub mod builder;
pub mod keys;

pub use builder::CitationGraphBuilder;
pub use keys::GraphKeyGenerator;
