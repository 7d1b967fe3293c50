use axum::extract::FromRef;

use crate::analysis::{AnalysisJobRunner, ValueFrameworkMerger};
use crate::call_registry::CallRegistry;
use crate::discovery_store::DiscoveryStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedDiscoveryStore = Arc<dyn DiscoveryStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub version: String,
    pub store: GuardedDiscoveryStore,
    pub runner: AnalysisJobRunner,
    pub merger: ValueFrameworkMerger,
    pub call_registry: CallRegistry,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedDiscoveryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for AnalysisJobRunner {
    fn from_ref(input: &ServerState) -> Self {
        input.runner.clone()
    }
}

impl FromRef<ServerState> for ValueFrameworkMerger {
    fn from_ref(input: &ServerState) -> Self {
        input.merger.clone()
    }
}

impl FromRef<ServerState> for CallRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.call_registry.clone()
    }
}
