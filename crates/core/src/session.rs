//! Caller-owned workspace state.
//!
//! The compositor keeps nothing between runs. Whatever a front end needs to
//! regenerate or resize a result (the chosen images, the last placement and
//! the current scale) lives here, is serializable, and is only updated once a
//! run has fully succeeded.

use crate::compositor::DEFAULT_SCALE_FACTOR;
use crate::geometry::RelativePosition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 2.0;

/// An image chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    pub path: PathBuf,
    pub label: String,
}

impl SourceImage {
    /// Uses the file name as the label.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, label }
    }
}

fn default_scale() -> f64 {
    DEFAULT_SCALE_FACTOR
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub product: Option<SourceImage>,
    /// The original scene. Generated results never replace it, so every
    /// regeneration starts from the untouched photo.
    pub scene: Option<SourceImage>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub last_placement: Option<RelativePosition>,
    #[serde(default)]
    pub last_prompt: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            product: None,
            scene: None,
            scale: DEFAULT_SCALE_FACTOR,
            last_placement: None,
            last_prompt: None,
        }
    }
}

/// Clamps a requested scale to the supported range.
pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

impl Session {
    /// Replaces the product; previous generation state no longer applies.
    pub fn set_product(&mut self, product: SourceImage) {
        self.product = Some(product);
        self.reset_generation();
    }

    /// Replaces the scene; previous generation state no longer applies.
    pub fn set_scene(&mut self, scene: SourceImage) {
        self.scene = Some(scene);
        self.reset_generation();
    }

    pub fn reset_generation(&mut self) {
        self.scale = DEFAULT_SCALE_FACTOR;
        self.last_placement = None;
        self.last_prompt = None;
    }

    pub fn is_ready(&self) -> bool {
        self.product.is_some() && self.scene.is_some()
    }

    /// Scale an adjust-by-`delta` action should run with, or `None` when the
    /// clamped value equals the current one.
    pub fn next_scale(&self, delta: f64) -> Option<f64> {
        let next = clamp_scale(self.scale + delta);
        if (next - self.scale).abs() < f64::EPSILON {
            None
        } else {
            Some(next)
        }
    }

    /// Commits a successful run.
    pub fn record_success(&mut self, placement: RelativePosition, scale: f64, prompt: impl Into<String>) {
        self.last_placement = Some(placement);
        self.scale = scale;
        self.last_prompt = Some(prompt.into());
    }
}
