//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database directory.

use super::constants::*;
use super::fakes::{FakeCallProvider, FakeExtractor, FakeOutcome};
use discovery_analysis_server::discovery_store::SqliteDiscoveryStore;
use discovery_analysis_server::server::{
    make_app, state::ServerState, RequestsLoggingLevel, ServerConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance backed by fakes
///
/// When dropped, the server gracefully shuts down and the temp dir is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Store for direct database access in tests
    pub store: Arc<SqliteDiscoveryStore>,

    pub extractor: Arc<FakeExtractor>,
    pub provider: Arc<FakeCallProvider>,

    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose extractor answers every job with a valid payload
    pub async fn spawn() -> Self {
        Self::spawn_with(
            FakeExtractor::new(Vec::new()),
            Duration::from_millis(DEFAULT_EXTRACTION_TIMEOUT_MS),
        )
        .await
    }

    /// Spawns a server whose extractor plays `outcomes` in order
    pub async fn spawn_scripted(outcomes: Vec<FakeOutcome>) -> Self {
        Self::spawn_with(
            FakeExtractor::new(outcomes),
            Duration::from_millis(DEFAULT_EXTRACTION_TIMEOUT_MS),
        )
        .await
    }

    pub async fn spawn_with(extractor: FakeExtractor, extraction_timeout: Duration) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteDiscoveryStore::new(&temp_db_dir.path().join("discovery.db"))
                .expect("Failed to open discovery store"),
        );
        let extractor = Arc::new(extractor);
        let provider = Arc::new(FakeCallProvider::default());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            poll_interval: Duration::from_millis(JOB_POLL_INTERVAL_MS),
        };
        let state = ServerState::new(
            config,
            store.clone(),
            extractor.clone(),
            provider.clone(),
            extraction_timeout,
        );
        state
            .runner
            .recover_interrupted_jobs()
            .expect("Failed to recover interrupted jobs");
        let app = make_app(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            store,
            extractor,
            provider,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Polls `/` until the server answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
