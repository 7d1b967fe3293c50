//! Shared constants for end-to-end tests

// ============================================================================
// Server
// ============================================================================

/// Max time to wait for a spawned server to answer
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness probes
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Timeout of every test HTTP request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Interval used when polling analysis jobs
pub const JOB_POLL_INTERVAL_MS: u64 = 20;

/// Extraction timeout used unless a test asks for another one
pub const DEFAULT_EXTRACTION_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Engagement and calls served by the fake provider
// ============================================================================

pub const ACCOUNT_NAME: &str = "Acme Corp";
pub const ACCOUNT_DOMAIN: &str = "acme.com";

pub const EXTERNAL_CALL_1: &str = "gong-1001";
pub const EXTERNAL_CALL_2: &str = "gong-1002";
/// Known to the provider but without a transcript
pub const EXTERNAL_CALL_NO_TRANSCRIPT: &str = "gong-1003";

/// Start times (unix millis) of the fake calls, call 2 being the newest
pub const CALL_1_STARTED_AT: i64 = 1_717_236_000_000;
pub const CALL_2_STARTED_AT: i64 = 1_717_840_800_000;
pub const CALL_3_STARTED_AT: i64 = 1_717_408_800_000;
