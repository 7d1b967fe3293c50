//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When routes or request
//! formats change, update only this file.

use super::constants::*;
use discovery_analysis_server::analysis::{AnalysisApiClient, StatusPoller};
use discovery_analysis_server::discovery_store::AnalysisJob;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST request failed")
    }

    async fn patch(&self, path: &str, body: Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("PATCH request failed")
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    // ========================================================================
    // Engagements and value frameworks
    // ========================================================================

    pub async fn create_engagement(&self, account_name: &str, account_domain: Option<&str>) -> Response {
        self.post(
            "/v1/engagements",
            json!({ "account_name": account_name, "account_domain": account_domain }),
        )
        .await
    }

    /// Creates the default test engagement and returns its id
    pub async fn create_test_engagement(&self) -> String {
        let response = self
            .create_engagement(ACCOUNT_NAME, Some(ACCOUNT_DOMAIN))
            .await;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn get_engagement(&self, engagement_id: &str) -> Response {
        self.get(&format!("/v1/engagements/{}", engagement_id)).await
    }

    pub async fn get_value_framework(&self, engagement_id: &str) -> Response {
        self.get(&format!("/v1/engagements/{}/value-framework", engagement_id))
            .await
    }

    pub async fn value_framework(&self, engagement_id: &str) -> Value {
        let response = self.get_value_framework(engagement_id).await;
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    pub async fn update_value_framework(&self, engagement_id: &str, body: Value) -> Response {
        self.patch(
            &format!("/v1/engagements/{}/value-framework", engagement_id),
            body,
        )
        .await
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub async fn list_calls(&self, engagement_id: &str) -> Response {
        self.get(&format!("/v1/engagements/{}/calls", engagement_id))
            .await
    }

    pub async fn search_calls(&self, engagement_id: &str, body: Value) -> Response {
        self.post(
            &format!("/v1/engagements/{}/calls/search", engagement_id),
            body,
        )
        .await
    }

    pub async fn fetch_transcript(&self, engagement_id: &str, call_id: &str) -> Response {
        self.client
            .post(self.url(&format!(
                "/v1/engagements/{}/calls/{}/fetch-transcript",
                engagement_id, call_id
            )))
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn select_call(&self, engagement_id: &str, call_id: &str, selected: bool) -> Response {
        self.patch(
            &format!("/v1/engagements/{}/calls/{}/select", engagement_id, call_id),
            json!({ "selected": selected }),
        )
        .await
    }

    /// Searches the default domain and returns internal call ids keyed by
    /// external id
    pub async fn discover_calls(&self, engagement_id: &str) -> Vec<(String, String)> {
        let response = self.search_calls(engagement_id, json!({})).await;
        assert_eq!(response.status(), 200);
        let calls: Vec<Value> = response.json().await.unwrap();
        calls
            .iter()
            .map(|c| {
                (
                    c["external_id"].as_str().unwrap().to_string(),
                    c["id"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    /// Fetches the transcript of a call and marks it selected
    pub async fn prepare_call(&self, engagement_id: &str, call_id: &str) {
        let response = self.fetch_transcript(engagement_id, call_id).await;
        assert_eq!(response.status(), 200);
        let response = self.select_call(engagement_id, call_id, true).await;
        assert_eq!(response.status(), 200);
    }

    // ========================================================================
    // Analyses
    // ========================================================================

    pub async fn analyze(&self, engagement_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/engagements/{}/analyze", engagement_id)))
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn create_analysis(&self, engagement_id: &str, call_ids: &[&str]) -> Response {
        self.post(
            &format!("/v1/engagements/{}/analyses", engagement_id),
            json!({ "call_ids": call_ids }),
        )
        .await
    }

    pub async fn list_analyses(&self, engagement_id: &str) -> Response {
        self.get(&format!("/v1/engagements/{}/analyses", engagement_id))
            .await
    }

    pub async fn get_analysis(&self, engagement_id: &str, job_id: &str) -> Response {
        self.get(&format!(
            "/v1/engagements/{}/analyses/{}",
            engagement_id, job_id
        ))
        .await
    }

    pub async fn apply_analysis(&self, engagement_id: &str, job_id: &str, body: Value) -> Response {
        self.post(
            &format!(
                "/v1/engagements/{}/analyses/{}/apply",
                engagement_id, job_id
            ),
            body,
        )
        .await
    }

    /// Starts an analysis of the current selection and returns the job id
    pub async fn start_analysis(&self, engagement_id: &str) -> String {
        let response = self.analyze(engagement_id).await;
        assert_eq!(response.status(), 202);
        let job: Value = response.json().await.unwrap();
        job["id"].as_str().unwrap().to_string()
    }

    /// Polls the job through the public API until it is completed or failed
    pub async fn wait_for_job(&self, engagement_id: &str, job_id: &str) -> AnalysisJob {
        let source = AnalysisApiClient::new(&self.base_url, engagement_id)
            .expect("Failed to build analysis API client");
        let poller = StatusPoller::new(Duration::from_millis(JOB_POLL_INTERVAL_MS));
        tokio::time::timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            poller.poll_until_terminal(&source, job_id),
        )
        .await
        .expect("Job did not finish in time")
        .expect("Polling failed")
    }
}
