//! The remote model boundary.
//!
//! The orchestrator only needs two calls from a multi-modal model: a
//! text answer about one image, and a generation call that may return an
//! inline image among its parts. [`GeminiClient`](crate::gemini::GeminiClient)
//! is the production implementation; tests substitute in-memory fakes.

use crate::error::Result;
use crate::image_processing::EncodedImage;
use async_trait::async_trait;

/// One part of a generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    /// Inline image data, base64 encoded as delivered by the API.
    InlineImage { mime_type: String, data: String },
}

impl ResponsePart {
    /// Finds the first part carrying inline image data.
    pub fn first_image(parts: &[ResponsePart]) -> Option<(&str, &str)> {
        parts.iter().find_map(|part| match part {
            ResponsePart::InlineImage { mime_type, data } => Some((mime_type.as_str(), data.as_str())),
            ResponsePart::Text(_) => None,
        })
    }
}

/// A multi-modal model able to describe and compose images.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Answers `prompt` about `image` in free-form text.
    async fn describe(&self, image: &EncodedImage, prompt: &str) -> Result<String>;

    /// Sends `images` followed by `prompt` to the image model and returns
    /// the parts of its first candidate.
    async fn compose(&self, images: &[EncodedImage], prompt: &str) -> Result<Vec<ResponsePart>>;
}
