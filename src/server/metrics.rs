use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all metrics of this server
const PREFIX: &str = "discovery";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Analysis Job Metrics
    pub static ref ANALYSIS_JOBS_CREATED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_analysis_jobs_created_total"),
        "Total analysis jobs created"
    ).expect("Failed to create analysis_jobs_created_total metric");

    pub static ref ANALYSIS_JOBS_RESOLVED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_analysis_jobs_resolved_total"),
            "Analysis jobs that reached a terminal state"
        ),
        &["outcome"]
    ).expect("Failed to create analysis_jobs_resolved_total metric");

    pub static ref ANALYSIS_JOBS_IN_FLIGHT: Gauge = Gauge::new(
        format!("{PREFIX}_analysis_jobs_in_flight"),
        "Analysis jobs currently executing"
    ).expect("Failed to create analysis_jobs_in_flight metric");

    pub static ref EXTRACTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_extraction_duration_seconds"),
            "Time spent waiting on the extraction adapter"
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0])
    ).expect("Failed to create extraction_duration_seconds metric");

    pub static ref EXTRACTION_TOKENS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_extraction_tokens_total"), "Model tokens consumed"),
        &["direction"]
    ).expect("Failed to create extraction_tokens_total metric");

    // Value Framework Metrics
    pub static ref VALUE_FRAMEWORK_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_value_framework_writes_total"),
            "Value framework writes"
        ),
        &["source", "status"]
    ).expect("Failed to create value_framework_writes_total metric");
}

/// Initialize all metrics and register them with the global registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ANALYSIS_JOBS_CREATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ANALYSIS_JOBS_RESOLVED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ANALYSIS_JOBS_IN_FLIGHT.clone()));
    let _ = REGISTRY.register(Box::new(EXTRACTION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(EXTRACTION_TOKENS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(VALUE_FRAMEWORK_WRITES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Replaces id-like path segments so label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = normalize_path(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, &path])
        .observe(duration.as_secs_f64());
}

pub fn record_analysis_job_created() {
    ANALYSIS_JOBS_CREATED_TOTAL.inc();
}

pub fn set_analysis_job_running(running: bool) {
    if running {
        ANALYSIS_JOBS_IN_FLIGHT.inc();
    } else {
        ANALYSIS_JOBS_IN_FLIGHT.dec();
    }
}

/// Record a job reaching a terminal state (`completed`, `failed` or `interrupted`)
pub fn record_analysis_job_resolved(outcome: &str) {
    ANALYSIS_JOBS_RESOLVED_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_extraction(duration: Duration, input_tokens: i64, output_tokens: i64) {
    EXTRACTION_DURATION_SECONDS.observe(duration.as_secs_f64());
    EXTRACTION_TOKENS_TOTAL
        .with_label_values(&["input"])
        .inc_by(input_tokens.max(0) as f64);
    EXTRACTION_TOKENS_TOTAL
        .with_label_values(&["output"])
        .inc_by(output_tokens.max(0) as f64);
}

/// Record a value framework write. `source` is `apply` or `edit`.
pub fn record_value_framework_write(source: &str, status: &str) {
    VALUE_FRAMEWORK_WRITES_TOTAL
        .with_label_values(&[source, status])
        .inc();
}

/// Handler for /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
