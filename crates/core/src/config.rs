use std::env;
use crate::error::{AppError, Result};
use crate::image_processing::MAX_TARGET_DIMENSION;
use dotenvy::dotenv;

/// Default side of the padded square sent to the models.
pub const DEFAULT_TARGET_DIMENSION: u32 = 1024;

pub const DEFAULT_DESCRIBE_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: String,
    /// Text-capable model used for the placement description.
    pub describe_model: String,
    /// Image model used for the composite itself.
    pub image_model: String,
    pub target_dimension: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::Config("GEMINI_API_KEY must be set in environment or .env file".to_string()))?;

        let mut config = Self::with_api_key(api_key);

        if let Ok(model) = env::var("GEMINI_DESCRIBE_MODEL") {
            config.describe_model = model;
        }
        if let Ok(model) = env::var("GEMINI_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Ok(raw) = env::var("COMPOSER_TARGET_DIMENSION") {
            config.target_dimension = parse_target_dimension(&raw)?;
        }

        Ok(config)
    }

    /// Builds a configuration with default models around an explicit key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            gemini_api_key: api_key.into(),
            describe_model: DEFAULT_DESCRIBE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            target_dimension: DEFAULT_TARGET_DIMENSION,
        }
    }
}

fn parse_target_dimension(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(value) if (1..=MAX_TARGET_DIMENSION).contains(&value) => Ok(value),
        _ => Err(AppError::config(format!(
            "COMPOSER_TARGET_DIMENSION must be an integer in 1..={}, got '{}'",
            MAX_TARGET_DIMENSION, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_key() {
        let config = Config::with_api_key("secret");
        assert_eq!(config.gemini_api_key, "secret");
        assert_eq!(config.describe_model, DEFAULT_DESCRIBE_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.target_dimension, 1024);
    }

    #[test]
    fn target_dimension_must_be_positive() {
        assert_eq!(parse_target_dimension(" 768 ").unwrap(), 768);
        assert!(parse_target_dimension("0").is_err());
        assert!(parse_target_dimension("big").is_err());
    }

    #[test]
    fn target_dimension_is_capped_at_load_time() {
        assert_eq!(parse_target_dimension("8192").unwrap(), MAX_TARGET_DIMENSION);
        let err = parse_target_dimension("10000").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
