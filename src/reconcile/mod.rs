//! Lookup reconciliation: caching, resolution, batch processing and pruning

pub mod batch;
pub mod cache;
pub mod core;
pub mod prune;
pub mod resolver;

pub use batch::*;
pub use cache::*;
pub use self::core::*;
pub use prune::*;
pub use resolver::*;
