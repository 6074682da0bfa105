pub mod types;
pub mod defaults;
pub mod sanitize;
pub mod coerce;
pub mod normalize;
pub mod balance;
pub mod prompt;
pub mod client;
pub mod orchestrator;

#[cfg(test)]
mod property_tests;

pub use types::*;
pub use sanitize::*;
pub use normalize::*;
pub use balance::*;
pub use prompt::*;
pub use client::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Document text is empty")]
    InputEmpty,

    #[error("No API key configured (set OPENROUTER_API_KEY)")]
    MissingApiKey,

    #[error("Cannot reach model endpoint at {0}")]
    Connection(String),

    #[error("Model API returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed chat-completion envelope: {0}")]
    MalformedEnvelope(String),
}

impl StructuringError {
    /// Transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::HttpClient(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
