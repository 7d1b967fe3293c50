mod analysis_routes;
mod api_error;
mod call_routes;
pub mod config;
mod engagement_routes;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
