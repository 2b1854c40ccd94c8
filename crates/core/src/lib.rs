//! Jewel Composer Core Library
//!
//! This library places a jewelry product photo into a scene photo at a
//! user-chosen point, using Google's Gemini image models for the actual
//! rendering.
//!
//! # Overview
//!
//! The interesting work happens around the remote call:
//!
//! - **Geometry**: click-to-percentage mapping over letterboxed images via [`geometry`]
//! - **Normalizing**: padding any image into a gray square via [`image_processing`]
//! - **Marking**: drawing the placement marker via [`marker`]
//! - **Lighting**: sampling local color and sharpness via [`lighting`]
//! - **Restoring**: cropping the model output back to the scene aspect via [`image_processing`]
//! - **Orchestration**: the full pipeline via [`compositor`]
//!
//! # Quick Start
//!
//! ```ignore
//! use jewel_composer_core::{CompositeRequest, JewelComposer, RelativePosition};
//!
//! let composer = JewelComposer::new()?;
//! let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);
//! let result = composer.compose(&request).await?;
//! println!("{}", result.final_prompt);
//! ```
//!
//! # Module Structure
//!
//! - [`compositor`]: The pipeline and its progress events
//! - [`config`]: Configuration loading and management
//! - [`error`]: Error types and result aliases
//! - [`gemini`]: Gemini implementation of the model boundary
//! - [`geometry`]: Shared content-rectangle math and pointer mapping
//! - [`image_processing`]: Decode, letterbox, restore and encode
//! - [`lighting`]: Local region analysis
//! - [`marker`]: Placement marker drawing
//! - [`model`]: The remote model trait
//! - [`prompt`]: Prompt templates
//! - [`session`]: Caller-owned workspace state

pub mod compositor;
pub mod config;
pub mod error;
pub mod gemini;
pub mod geometry;
pub mod image_processing;
pub mod lighting;
pub mod marker;
pub mod model;
pub mod prompt;
pub mod session;

// Re-export primary types for convenience
pub use compositor::{CompositeRequest, Compositor, GenerationResult, PipelineEvent, Stage};
pub use config::Config;
pub use error::{AppError, Result};
pub use gemini::GeminiClient;
pub use geometry::{ContainerRect, Dimensions, PixelPosition, RelativePosition, map_point_to_content};
pub use image_processing::{EncodedImage, ImageProcessor};
pub use model::GenerativeModel;
pub use session::{Session, SourceImage};

use std::sync::mpsc::Sender;

/// Main entry point for Gemini-backed compositing.
///
/// Holds the configuration and a ready [`Compositor`]. Like the compositor
/// itself it carries no per-run state, so one instance serves any number of
/// sequential runs.
pub struct JewelComposer {
    config: Config,
    compositor: Compositor<GeminiClient>,
}

impl JewelComposer {
    /// Creates an instance from environment configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is missing, a setting is invalid
    /// or the Gemini client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    /// Creates an instance with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gemini client cannot be created.
    pub fn with_config(config: Config) -> Result<Self> {
        let compositor = Compositor::from_config(&config)?;
        Ok(Self { config, compositor })
    }

    /// Runs one composite.
    ///
    /// # Errors
    ///
    /// See [`Compositor::generate_composite`].
    pub async fn compose(&self, request: &CompositeRequest<'_>) -> Result<GenerationResult> {
        self.compositor.generate_composite(request).await
    }

    /// Runs one composite, publishing progress on `events`.
    ///
    /// # Errors
    ///
    /// See [`Compositor::generate_composite`].
    pub async fn compose_with_events(
        &self,
        request: &CompositeRequest<'_>,
        events: &Sender<PipelineEvent>,
    ) -> Result<GenerationResult> {
        self.compositor.generate_composite_with_events(request, Some(events)).await
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup. This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
