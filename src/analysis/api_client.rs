//! Reads analysis jobs from a running server over HTTP.

use super::poller::JobStatusSource;
use crate::discovery_store::AnalysisJob;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub struct AnalysisApiClient {
    client: Client,
    base_url: String,
    engagement_id: String,
}

impl AnalysisApiClient {
    pub fn new(base_url: &str, engagement_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            engagement_id: engagement_id.to_string(),
        })
    }

    fn job_url(&self, job_id: &str) -> String {
        format!(
            "{}/v1/engagements/{}/analyses/{}",
            self.base_url, self.engagement_id, job_id
        )
    }
}

#[async_trait]
impl JobStatusSource for AnalysisApiClient {
    async fn fetch_job(&self, job_id: &str) -> Result<AnalysisJob> {
        let url = self.job_url(job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            bail!("Analysis job {} not found", job_id);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GET {} returned {}: {}", url, status, body);
        }
        response
            .json::<AnalysisJob>()
            .await
            .context("Failed to decode analysis job")
    }
}
