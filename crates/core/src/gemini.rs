use crate::config::Config;
use crate::error::{AppError, Result};
use crate::image_processing::EncodedImage;
use crate::model::{GenerativeModel, ResponsePart};
use async_trait::async_trait;
use gemini_rust::{Gemini, Content, Part, Role, Blob, Message};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Gemini-backed [`GenerativeModel`]: one client per model.
pub struct GeminiClient {
    describer: Gemini,
    composer: Gemini,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            describer: build_client(&config.gemini_api_key, &config.describe_model)?,
            composer: build_client(&config.gemini_api_key, &config.image_model)?,
        })
    }
}

fn build_client(api_key: &str, model_name: &str) -> Result<Gemini> {
    // Explicit base URL avoids the BadScheme error from the default one
    let base_url = url::Url::parse(BASE_URL)
        .map_err(|e| AppError::Config(format!("Invalid base URL: {}", e)))?;

    let model_name = if model_name.starts_with("models/") {
        model_name.to_string()
    } else {
        format!("models/{}", model_name)
    };
    let model_url = format!("{}{}", BASE_URL, model_name);

    Gemini::with_model_and_base_url(api_key, model_url, base_url)
        .map_err(|e| AppError::Config(format!("Failed to create Gemini client: {}", e)))
}

fn image_part(image: &EncodedImage) -> Part {
    Part::InlineData {
        inline_data: Blob {
            mime_type: image.mime_type.clone(),
            data: image.to_base64(),
        },
    }
}

fn text_part(text: &str) -> Part {
    Part::Text {
        text: text.to_string(),
        thought: None,
        thought_signature: None,
    }
}

fn user_message(parts: Vec<Part>) -> Message {
    Message {
        role: Role::User,
        content: Content {
            role: Some(Role::User),
            parts: Some(parts),
        },
    }
}

/// Keeps text and inline images in order; other part kinds are dropped.
fn response_parts(parts: &[Part]) -> Vec<ResponsePart> {
    parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { text, .. } => Some(ResponsePart::Text(text.clone())),
            Part::InlineData { inline_data, .. } => Some(ResponsePart::InlineImage {
                mime_type: inline_data.mime_type.clone(),
                data: inline_data.data.clone(),
            }),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    /// Sends the image and the instruction, returns the concatenated text parts.
    async fn describe(&self, image: &EncodedImage, prompt: &str) -> Result<String> {
        let message = user_message(vec![text_part(prompt), image_part(image)]);

        let response = self.describer
            .generate_content()
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(|e| AppError::gemini(format!("Describe request failed: {:?}", e)))?;

        let text = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.as_ref())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Text { text, .. } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::gemini("No text response received from Gemini"));
        }
        Ok(text)
    }

    /// Images go first, the prompt last.
    async fn compose(&self, images: &[EncodedImage], prompt: &str) -> Result<Vec<ResponsePart>> {
        let mut parts: Vec<Part> = images.iter().map(image_part).collect();
        parts.push(text_part(prompt));

        let response = self.composer
            .generate_content()
            .with_messages(vec![user_message(parts)])
            .execute()
            .await
            .map_err(|e| AppError::gemini(format!("Compose request failed: {:?}", e)))?;

        let parts = response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.as_deref())
            .map(response_parts)
            .unwrap_or_default();

        Ok(parts)
    }
}
