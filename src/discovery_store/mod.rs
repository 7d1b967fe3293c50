//! Persistence for engagements, calls, analysis jobs and value frameworks.

mod models;
mod schema;
mod sqlite_discovery_store;
mod store;

pub use models::*;
pub use sqlite_discovery_store::SqliteDiscoveryStore;
pub use store::*;
