//! Generation gateway for Newsdesk stages.
//!
//! Provides the `GenerationGateway` trait the pipeline calls for every
//! structured generation, an OpenAI-compatible chat adapter, JSON extraction
//! from model text, and a retrying wrapper with backoff.

mod gateway;
mod json;
mod openai;
mod retry;
mod types;

pub use gateway::{GenerationGateway, LoggingGateway};
pub use json::{extract_json, is_schema_echo};
pub use openai::OpenAiGateway;
pub use retry::{BackoffPolicy, RetryingGateway};
pub use types::{Prompt, PromptTemplate};
