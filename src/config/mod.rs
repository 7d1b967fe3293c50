mod file_config;

pub use file_config::{CallProviderConfig, ExtractionConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const GONG_ACCESS_KEY_ENV: &str = "GONG_ACCESS_KEY";
pub const GONG_ACCESS_KEY_SECRET_ENV: &str = "GONG_ACCESS_KEY_SECRET";

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub poll_interval_secs: u64,

    pub extraction: ExtractionSettings,
    pub call_provider: CallProviderSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present. Credentials missing from
    /// both fall back to the environment.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        Self::resolve_with_env(cli, file_config, |key| std::env::var(key).ok())
    }

    fn resolve_with_env<F>(cli: &CliConfig, file_config: Option<FileConfig>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());
        let poll_interval_secs = file.poll_interval_secs.unwrap_or(cli.poll_interval_secs);
        if poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }

        let ex_file = file.extraction.unwrap_or_default();
        let ex_default = ExtractionSettings::default();
        let extraction = ExtractionSettings {
            api_base_url: ex_file.api_base_url.unwrap_or(ex_default.api_base_url),
            model: ex_file.model.unwrap_or(ex_default.model),
            api_key: ex_file.api_key.or_else(|| env(ANTHROPIC_API_KEY_ENV)),
            max_tokens: ex_file.max_tokens.unwrap_or(ex_default.max_tokens),
            temperature: ex_file.temperature.unwrap_or(ex_default.temperature),
            timeout_secs: ex_file.timeout_secs.unwrap_or(ex_default.timeout_secs),
        };

        let cp_file = file.call_provider.unwrap_or_default();
        let cp_default = CallProviderSettings::default();
        let call_provider = CallProviderSettings {
            base_url: cp_file.base_url.unwrap_or(cp_default.base_url),
            access_key: cp_file.access_key.or_else(|| env(GONG_ACCESS_KEY_ENV)),
            access_key_secret: cp_file
                .access_key_secret
                .or_else(|| env(GONG_ACCESS_KEY_SECRET_ENV)),
            max_retries: cp_file.max_retries.unwrap_or(cp_default.max_retries),
            initial_backoff_ms: cp_file
                .initial_backoff_ms
                .unwrap_or(cp_default.initial_backoff_ms),
            request_timeout_secs: cp_file
                .request_timeout_secs
                .unwrap_or(cp_default.request_timeout_secs),
            max_concurrent_requests: cp_file
                .max_concurrent_requests
                .unwrap_or(cp_default.max_concurrent_requests),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            poll_interval_secs,
            extraction,
            call_provider,
        })
    }

    pub fn discovery_db_path(&self) -> PathBuf {
        self.db_dir.join("discovery.db")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub api_base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound for one whole extraction, retries included.
    pub timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.2,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallProviderSettings {
    pub base_url: String,
    pub access_key: Option<String>,
    pub access_key_secret: Option<String>,
    /// Total attempts per request, the first one included.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
}

impl Default for CallProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.gong.io/v2".to_string(),
            access_key: None,
            access_key_secret: None,
            max_retries: 4,
            initial_backoff_ms: 1000,
            request_timeout_secs: 30,
            max_concurrent_requests: 3,
        }
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
