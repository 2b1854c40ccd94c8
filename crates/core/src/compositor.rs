//! The compositing pipeline.
//!
//! [`Compositor::generate_composite`] runs one linear, stateless pass:
//!
//! 1. measure the scene,
//! 2. letterbox product and scene into squares,
//! 3. mark the placement on a copy of the scene (published at once as the
//!    debug image),
//! 4. sample local lighting on the clean scene,
//! 5. ask the model for a placement description (best effort),
//! 6. build the compose prompt,
//! 7. send product, clean scene and marked scene to the image model,
//! 8. take the first inline image of the answer,
//! 9. crop it back to the scene's aspect ratio.
//!
//! Pixel work runs on tokio's blocking pool. Nothing is retried and nothing
//! is kept between calls; re-run with a new position or scale to adjust.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::gemini::GeminiClient;
use crate::geometry::{Dimensions, RelativePosition};
use crate::image_processing::{EncodedImage, ImageProcessor};
use crate::lighting::{LocalLighting, analyze_region};
use crate::marker::draw_marker;
use crate::model::{GenerativeModel, ResponsePart};
use crate::prompt::{DESCRIBE_PROMPT, FALLBACK_PLACEMENT, composite_prompt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// Default jewelry scale (100% of realistic size).
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MeasuringScene,
    Normalizing,
    Marking,
    AnalyzingLight,
    DescribingPlacement,
    BuildingPrompt,
    Generating,
    Restoring,
}

impl Stage {
    /// Short progress message for display.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::MeasuringScene => "Surveying the scene...",
            Stage::Normalizing => "Analyzing your jewelry...",
            Stage::Marking => "Marking the placement...",
            Stage::AnalyzingLight => "Reading the local light...",
            Stage::DescribingPlacement => "Describing placement location with AI...",
            Stage::BuildingPrompt => "Crafting the perfect composition prompt...",
            Stage::Generating => "Generating photorealistic composite...",
            Stage::Restoring => "Assembling the final scene...",
        }
    }
}

/// Progress published while a composite is being produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Stage(Stage),
    /// Data URL of the marked scene; sent before any remote call.
    DebugImage(String),
}

/// Inputs of one composite run.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub product_image: &'a [u8],
    pub product_label: &'a str,
    pub scene_image: &'a [u8],
    pub scene_label: &'a str,
    pub position: RelativePosition,
    pub scale_factor: f64,
}

impl<'a> CompositeRequest<'a> {
    pub fn new(product_image: &'a [u8], scene_image: &'a [u8], position: RelativePosition) -> Self {
        Self {
            product_image,
            product_label: "product",
            scene_image,
            scene_label: "scene",
            position,
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }

    pub fn with_labels(mut self, product_label: &'a str, scene_label: &'a str) -> Self {
        self.product_label = product_label;
        self.scene_label = scene_label;
        self
    }

    pub fn with_scale(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.position.is_within_bounds() {
            return Err(AppError::invalid(format!(
                "placement ({:.2}%, {:.2}%) is outside 0-100%",
                self.position.x_percent, self.position.y_percent
            )));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(AppError::invalid(format!(
                "scale factor must be a positive number, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Output of one composite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Composite cropped back to the scene's aspect ratio, as a data URL.
    pub final_image_url: String,
    /// Normalized scene with the placement marker, as a data URL.
    pub debug_image_url: String,
    /// Exact prompt sent to the image model.
    pub final_prompt: String,
}

/// Everything the blocking preparation stage hands to the remote stages.
struct Prepared {
    scene_dimensions: Dimensions,
    product: EncodedImage,
    scene: EncodedImage,
    marked: EncodedImage,
    debug_image_url: String,
    lighting: LocalLighting,
}

#[derive(Clone)]
struct Reporter(Option<Sender<PipelineEvent>>);

impl Reporter {
    fn stage(&self, stage: Stage) {
        debug!("Stage: {:?}", stage);
        if let Some(tx) = &self.0 {
            let _ = tx.send(PipelineEvent::Stage(stage));
        }
    }

    fn debug_image(&self, url: &str) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(PipelineEvent::DebugImage(url.to_string()));
        }
    }
}

/// Runs composites against a [`GenerativeModel`].
pub struct Compositor<M> {
    model: M,
    target_dimension: u32,
}

impl Compositor<GeminiClient> {
    /// Builds a Gemini-backed compositor from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if a Gemini client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(config)?).with_target_dimension(config.target_dimension))
    }
}

impl<M: GenerativeModel> Compositor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            target_dimension: crate::config::DEFAULT_TARGET_DIMENSION,
        }
    }

    /// Overrides the side of the padded squares.
    pub fn with_target_dimension(mut self, target_dimension: u32) -> Self {
        self.target_dimension = target_dimension;
        self
    }

    pub fn target_dimension(&self) -> u32 {
        self.target_dimension
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Produces one composite.
    ///
    /// # Errors
    ///
    /// Fails on invalid input, undecodable images, an unusable target
    /// dimension, a failed compose call or a response without an image.
    /// A failed description call is not an error.
    pub async fn generate_composite(&self, request: &CompositeRequest<'_>) -> Result<GenerationResult> {
        self.generate_composite_with_events(request, None).await
    }

    /// Like [`generate_composite`](Self::generate_composite), publishing
    /// [`PipelineEvent`]s on `events` as the run progresses.
    ///
    /// # Errors
    ///
    /// Same as [`generate_composite`](Self::generate_composite).
    pub async fn generate_composite_with_events(
        &self,
        request: &CompositeRequest<'_>,
        events: Option<&Sender<PipelineEvent>>,
    ) -> Result<GenerationResult> {
        request.validate()?;
        info!(
            "Compositing '{}' into '{}' at ({:.1}%, {:.1}%), scale {}",
            request.product_label,
            request.scene_label,
            request.position.x_percent,
            request.position.y_percent,
            request.scale_factor
        );

        let reporter = Reporter(events.cloned());
        let target = self.target_dimension;
        let position = request.position;
        let product_bytes = request.product_image.to_vec();
        let scene_bytes = request.scene_image.to_vec();
        let prep_reporter = reporter.clone();

        let prepared = tokio::task::spawn_blocking(move || {
            prepare(&product_bytes, &scene_bytes, position, target, &prep_reporter)
        })
        .await
        .map_err(|e| AppError::Task(e.to_string()))??;

        reporter.stage(Stage::DescribingPlacement);
        let placement = self.describe_placement(&prepared.marked).await;

        reporter.stage(Stage::BuildingPrompt);
        let prompt = composite_prompt(&prepared.lighting.hint(), &placement, request.scale_factor);

        reporter.stage(Stage::Generating);
        let Prepared {
            scene_dimensions,
            product,
            scene,
            marked,
            debug_image_url,
            ..
        } = prepared;
        let parts = self.model.compose(&[product, scene, marked], &prompt).await?;

        let (mime_type, data) = ResponsePart::first_image(&parts).ok_or_else(|| {
            warn!("Model response did not contain an image part ({} parts)", parts.len());
            AppError::NoImageReturned
        })?;
        info!("Received image data ({}), length: {}", mime_type, data.len());
        let generated = EncodedImage::from_base64(mime_type, data)?;

        reporter.stage(Stage::Restoring);
        let restored = tokio::task::spawn_blocking(move || {
            let square = ImageProcessor::decode(&generated.bytes)?;
            let cropped = ImageProcessor::restore_aspect(&square, scene_dimensions, target)?;
            ImageProcessor::encode_jpeg(&cropped)
        })
        .await
        .map_err(|e| AppError::Task(e.to_string()))??;

        Ok(GenerationResult {
            final_image_url: restored.to_data_url(),
            debug_image_url,
            final_prompt: prompt,
        })
    }

    async fn describe_placement(&self, marked: &EncodedImage) -> String {
        match self.model.describe(marked, DESCRIBE_PROMPT).await {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                info!("Generated description: {}", text);
                text
            }
            Ok(_) => {
                warn!("Placement description came back empty, using fallback");
                FALLBACK_PLACEMENT.to_string()
            }
            Err(e) => {
                warn!("Failed to generate semantic location description: {}", e);
                FALLBACK_PLACEMENT.to_string()
            }
        }
    }
}

fn prepare(
    product_bytes: &[u8],
    scene_bytes: &[u8],
    position: RelativePosition,
    target: u32,
    reporter: &Reporter,
) -> Result<Prepared> {
    reporter.stage(Stage::MeasuringScene);
    let scene_dimensions = ImageProcessor::measure(scene_bytes)?;

    reporter.stage(Stage::Normalizing);
    let product = ImageProcessor::normalize(&ImageProcessor::decode(product_bytes)?, target)?;
    let scene = ImageProcessor::normalize(&ImageProcessor::decode(scene_bytes)?, target)?;

    reporter.stage(Stage::Marking);
    let marked = ImageProcessor::encode_jpeg(&draw_marker(scene.raster(), position, scene_dimensions))?;
    let debug_image_url = marked.to_data_url();
    reporter.debug_image(&debug_image_url);

    reporter.stage(Stage::AnalyzingLight);
    let lighting = analyze_region(scene.raster(), position, scene_dimensions)?;
    debug!("{}", lighting);

    Ok(Prepared {
        scene_dimensions,
        product: product.encoded().clone(),
        scene: scene.encoded().clone(),
        marked,
        debug_image_url,
        lighting,
    })
}
