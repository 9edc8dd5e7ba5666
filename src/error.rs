//! Error types for tandem.

use thiserror::Error;

/// Result type alias for tandem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tandem.
#[derive(Error, Debug)]
pub enum Error {
    /// Prompt does not fit in the model context.
    #[error("prompt of {n_prompt} tokens exceeds context size {n_ctx}")]
    PromptTooLong { n_prompt: usize, n_ctx: usize },

    /// The decode primitive was fed a batch starting at the wrong position.
    #[error("decode position {got} does not match cached length {expected}")]
    CachePosition { expected: usize, got: usize },

    /// The underlying decode primitive failed.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Model loading failed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// HTTP round-trip to the peer failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
