//! Error types for the jewel-composer-core library.
//!
//! Each fatal condition of the compositing pipeline has its own variant so
//! callers can display the message verbatim and offer a clean retry.

use thiserror::Error;

/// Errors that can occur within the jewel-composer-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source image could not be read or decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// A raster surface of the requested size could not be allocated.
    #[error("Could not acquire a rendering surface: {0}")]
    Surface(String),

    /// Encoding a raster into its transport format failed.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The caller supplied an out-of-range placement or scale.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// General Gemini API error.
    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    /// The compose call succeeded but carried no inline image.
    #[error("The AI model did not return an image. Please try again.")]
    NoImageReturned,

    /// A blocking pixel task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inline image payload was not valid base64.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a surface acquisition error with the given message.
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    /// Creates an encoding error with the given message.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Creates an invalid input error with the given message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a Gemini API error with the given message.
    pub fn gemini(msg: impl Into<String>) -> Self {
        Self::GeminiApi(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
