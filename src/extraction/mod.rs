//! Extraction of value-framework insights from call transcripts.

mod adapter;
mod anthropic;
mod prompt;
mod result;

pub use adapter::*;
pub use anthropic::{AnthropicExtractor, AnthropicExtractorConfig};
pub use result::{ExtractionResult, InsightField, InvariantViolation};
