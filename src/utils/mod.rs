//! Storage backends, progress logging and validation utilities

pub mod memory_storage;
pub mod progress;
pub mod sqlite_storage;
pub mod validation;

pub use memory_storage::*;
pub use progress::*;
pub use sqlite_storage::*;
pub use validation::*;
