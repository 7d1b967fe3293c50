//! Call metadata and transcripts from the call-recording provider.

mod gong_client;
mod provider;
mod registry;
mod retry_policy;

pub use gong_client::GongCallProvider;
pub use provider::{CallProvider, DateRange, ProviderError};
pub use registry::CallRegistry;
pub use retry_policy::RetryPolicy;
