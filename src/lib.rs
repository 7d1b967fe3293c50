//! Discovery-call analysis server library.
//!
//! Exposes the internal modules for the binaries and the end-to-end tests.

pub mod analysis;
pub mod call_registry;
pub mod config;
pub mod discovery_store;
pub mod extraction;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use analysis::{AnalysisError, AnalysisJobRunner, StatusPoller, ValueFrameworkMerger};
pub use discovery_store::{DiscoveryStore, SqliteDiscoveryStore};
pub use server::{run_server, RequestsLoggingLevel};
