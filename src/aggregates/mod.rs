pub mod maintainer;
pub mod repo_types;

pub use maintainer::recompute_bucket;
