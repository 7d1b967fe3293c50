use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discovery_analysis_server::call_registry::{CallProvider, GongCallProvider};
use discovery_analysis_server::config::{AppConfig, CliConfig, ExtractionSettings, FileConfig};
use discovery_analysis_server::discovery_store::SqliteDiscoveryStore;
use discovery_analysis_server::extraction::{
    AnthropicExtractor, AnthropicExtractorConfig, Extractor,
};
use discovery_analysis_server::server::{
    metrics, run_server, state::ServerState, RequestsLoggingLevel, ServerConfig,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Optional TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Seconds between job status polls suggested to clients.
    #[clap(long, default_value_t = 3)]
    pub poll_interval_secs: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            poll_interval_secs: self.poll_interval_secs,
        }
    }
}

fn extractor_config(settings: &ExtractionSettings) -> AnthropicExtractorConfig {
    AnthropicExtractorConfig {
        base_url: settings.api_base_url.clone(),
        model: settings.model.clone(),
        api_key: settings.api_key.clone(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        request_timeout: Duration::from_secs(settings.timeout_secs),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let db_path = config.discovery_db_path();
    info!("Opening SQLite discovery database at {:?}...", db_path);
    let store = Arc::new(
        SqliteDiscoveryStore::new(&db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?,
    );

    if config.extraction.api_key.is_none() {
        warn!("No extraction API key configured, analysis jobs will fail until one is set");
    }
    info!("Extraction model: {}", config.extraction.model);
    let extractor: Arc<dyn Extractor> =
        Arc::new(AnthropicExtractor::new(extractor_config(&config.extraction)));

    if config.call_provider.access_key.is_none() || config.call_provider.access_key_secret.is_none() {
        warn!("Call provider credentials missing, call search and transcript fetch will fail");
    }
    let provider: Arc<dyn CallProvider> = Arc::new(GongCallProvider::new(&config.call_provider));

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        poll_interval: config.poll_interval(),
    };
    let state = ServerState::new(
        server_config,
        store,
        extractor,
        provider,
        Duration::from_secs(config.extraction.timeout_secs),
    );

    let recovered = state.runner.recover_interrupted_jobs()?;
    if recovered > 0 {
        warn!("Marked {} interrupted analysis jobs as failed", recovered);
    }

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
        }
        ctrl_c_token.cancel();
    });

    run_server(state, shutdown).await
}
