//! Translation backend library for parlo.
//!
//! This crate provides a trait-based abstraction for translating spoken or
//! typed utterances, with an implementation for the Gemini generateContent
//! API. Rate-limited requests are retried with bounded exponential backoff;
//! the policy lives in [`retry`] and is independent of the transport.

mod gemini;
mod retry;

use async_trait::async_trait;
pub use gemini::{FALLBACK_TEXT, GeminiClient, GeminiConfig};
pub use retry::{RetryPolicy, with_retry};
use thiserror::Error;

/// Errors that can occur during translation.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The service signalled "too many requests"; eligible for retry
    #[error("rate limited by the translation service")]
    RateLimited,

    #[error("API request failed: {0}")]
    Api(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response from the translation service: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl TranslateError {
    /// Whether this failure is the retryable "slow down" signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Result type for translation operations.
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Input to a translation request.
#[derive(Debug, Clone)]
pub enum TranslateInput {
    /// An encoded recording of a spoken utterance
    Audio { data: Vec<u8>, mime_type: String },
    /// A typed utterance
    Text(String),
}

/// Trait for translation backends.
///
/// Implement this trait to add new backends (other cloud providers, local
/// models, fakes for tests, etc.)
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a spoken or typed utterance to the target language.
    async fn translate(&self, input: TranslateInput) -> Result<String>;

    /// Returns the name of this translator for logging/debugging.
    fn name(&self) -> &str;
}
