//! Follows one analysis job on a running server until it finishes.

use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use discovery_analysis_server::analysis::{AnalysisApiClient, StatusPoller};
use discovery_analysis_server::discovery_store::{AnalysisJob, JobStatus};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Engagement the job belongs to.
    pub engagement_id: String,

    /// Job to watch.
    pub job_id: String,

    /// Base URL of the analysis server.
    #[clap(long, default_value = "http://127.0.0.1:3001")]
    pub server_url: String,

    /// Seconds between polls.
    #[clap(long, default_value_t = 3)]
    pub interval_secs: u64,
}

fn print_summary(job: &AnalysisJob) {
    match job.status {
        JobStatus::Completed => {
            println!("Job {} completed", job.id);
            if let Some(model) = &job.model_used {
                println!("  model: {}", model);
            }
            if let Some(result) = &job.extracted_data {
                println!("  confidence: {:.2}", result.confidence_score);
            }
            if let Some(usage) = &job.token_usage {
                println!(
                    "  tokens: {} in / {} out",
                    usage.input_tokens, usage.output_tokens
                );
            }
        }
        _ => {
            println!(
                "Job {} {}: {}",
                job.id,
                job.status.as_db_str(),
                job.error_message.as_deref().unwrap_or("no error message")
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    if args.interval_secs == 0 {
        bail!("--interval-secs must be greater than zero");
    }

    let client = AnalysisApiClient::new(&args.server_url, &args.engagement_id)?;
    let poller = StatusPoller::new(Duration::from_secs(args.interval_secs));

    let mut last_status = None;
    let observe = |job: &AnalysisJob| {
        if last_status != Some(job.status) {
            info!("Job {} is {}", job.id, job.status.as_db_str());
            last_status = Some(job.status);
        }
    };

    let job = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Stopped watching, the job keeps running on the server");
            return Ok(());
        }
        job = poller.poll_with_observer(&client, &args.job_id, observe) => job?,
    };

    print_summary(&job);
    if job.status == JobStatus::Failed {
        bail!("Analysis job {} failed", job.id);
    }
    Ok(())
}
