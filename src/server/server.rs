use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::analysis_routes::analysis_routes;
use super::call_routes::call_routes;
use super::engagement_routes::engagement_routes;
use super::metrics::metrics_handler;
use super::{log_requests, state::*, ServerConfig};
use crate::analysis::{AnalysisJobRunner, ValueFrameworkMerger};
use crate::call_registry::{CallProvider, CallRegistry};
use crate::extraction::Extractor;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub poll_interval_secs: u64,
    pub jobs: BTreeMap<&'static str, usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let jobs = match state.store.count_jobs_by_status() {
        Ok(counts) => counts
            .into_iter()
            .map(|(status, count)| (status.as_db_str(), count))
            .collect(),
        Err(err) => {
            tracing::warn!("Failed to count jobs: {:#}", err);
            BTreeMap::new()
        }
    };
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.clone(),
        poll_interval_secs: state.config.poll_interval.as_secs(),
        jobs,
    })
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: GuardedDiscoveryStore,
        extractor: Arc<dyn Extractor>,
        provider: Arc<dyn CallProvider>,
        extraction_timeout: Duration,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            runner: AnalysisJobRunner::new(store.clone(), extractor, extraction_timeout),
            merger: ValueFrameworkMerger::new(store.clone()),
            call_registry: CallRegistry::new(store.clone(), provider),
            store,
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let engagements: Router<ServerState> = engagement_routes()
        .merge(call_routes())
        .merge(analysis_routes());

    Router::new()
        .route("/", get(home))
        .nest("/v1/engagements", engagements)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API and the metrics endpoint until `shutdown` fires.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(("0.0.0.0", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    let api_shutdown = shutdown.clone();
    let api = axum::serve(listener, app)
        .with_graceful_shutdown(async move { api_shutdown.cancelled().await });
    let metrics = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { shutdown.cancelled().await });

    tokio::try_join!(async { api.await }, async { metrics.await })?;
    Ok(())
}
