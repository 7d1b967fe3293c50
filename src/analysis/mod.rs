mod api_client;
mod error;
mod merger;
mod poller;
mod runner;

pub use api_client::AnalysisApiClient;
pub use error::{AnalysisError, AnalysisResult};
pub use merger::ValueFrameworkMerger;
pub use poller::{JobStatusSource, StatusPoller, DEFAULT_POLL_INTERVAL};
pub use runner::{AnalysisJobRunner, INTERRUPTED_JOB_MESSAGE};
