//! Common test infrastructure
//!
//! Everything the end-to-end tests need: an isolated server with scriptable
//! extractor and call provider, and an HTTP client for the API.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, ACCOUNT_NAME, ACCOUNT_DOMAIN};
//!
//! #[tokio::test]
//! async fn test_create_engagement() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.create_engagement(ACCOUNT_NAME, Some(ACCOUNT_DOMAIN)).await;
//!     assert_eq!(response.status(), 201);
//! }
//! ```

mod client;
mod constants;
mod fakes;
mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{insights_payload, FakeCallProvider, FakeExtractor, FakeOutcome};
#[allow(unused_imports)]
pub use server::TestServer;
