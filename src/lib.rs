//! # Sample Data Update
//!
//! Reconciles sampled loan records against their import staging records,
//! resolving the free-text underwriter name and underwriting group into
//! lookup table values and rewriting the sampled loans to reference them.
//!
//! ## Features
//!
//! - **Lookup resolution**: create-or-reuse lookup values, memoized per run
//! - **Batch reconciliation**: primary and DAR sampled loans, each against its own import table
//! - **Pruning**: removal of lookup values no sampled loan references
//! - **Progress log**: operator messages mirrored to `tracing` and written to a log file
//! - **Storage abstraction**: trait-based storage with in-memory and SQLite backends
//!
//! ## Quick Start
//!
//! ```rust
//! use sample_data_update::utils::{MemoryStorage, ProgressLog};
//! use sample_data_update::{LookupTable, SampleDataUpdate};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let storage = MemoryStorage::new();
//! storage.add_lookup_table(LookupTable::new("UnderwriterNameCode", "Underwriter Names"));
//! storage.add_lookup_table(LookupTable::new("UnderwritingGrpCode", "Underwriting Groups"));
//!
//! let progress = ProgressLog::new();
//! let report = SampleDataUpdate::new(storage).run(&progress).await;
//! assert!(report.succeeded());
//! # });
//! ```

pub mod config;
pub mod reconcile;
pub mod runner;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconcile::*;
pub use runner::*;
pub use traits::*;
pub use types::*;
