//! Local lighting and sharpness estimation around the placement point.
//!
//! A small square patch of the clean normalized scene is sampled and reduced
//! to mean color, HSL-style saturation/lightness/hue, a warm/cool call and a
//! gradient-based sharpness band. The result is only ever embedded in the
//! generation prompt as a sentence; nothing parses it back.

use crate::error::{AppError, Result};
use crate::geometry::{Dimensions, PixelPosition, RelativePosition, placement_point};
use image::{GenericImageView, Rgb};
use std::fmt;

/// Smallest patch side, in pixels.
pub const MIN_PATCH_SIZE: u32 = 16;

/// Patch side as a fraction of the canvas side.
const PATCH_FRACTION: f64 = 0.07;

const SOFT_BELOW: f64 = 0.05;
const MODERATE_BELOW: f64 = 0.12;

/// The square region sampled around a placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePatch {
    /// Placement point the patch is centered on (before clamping).
    pub center: PixelPosition,
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl SamplePatch {
    /// Locates the patch on a `width`×`height` normalized canvas, clamped so
    /// it never leaves the canvas.
    pub fn locate(width: u32, height: u32, position: RelativePosition, source: Dimensions) -> Self {
        let center = placement_point(source, width, position);
        let size = ((width as f64 * PATCH_FRACTION).round() as u32)
            .max(MIN_PATCH_SIZE)
            .min(width.min(height));

        Self {
            center,
            x: clamp_origin(center.x, size, width - size),
            y: clamp_origin(center.y, size, height - size),
            size,
        }
    }
}

fn clamp_origin(center: f64, size: u32, max_origin: u32) -> u32 {
    (center - size as f64 / 2.0)
        .round()
        .clamp(0.0, max_origin as f64) as u32
}

/// Depth-of-field impression of the sampled area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharpness {
    Soft,
    Moderate,
    VerySharp,
}

impl Sharpness {
    /// Buckets a normalized mean gradient (0..=1).
    pub fn classify(score: f64) -> Self {
        if score < SOFT_BELOW {
            Self::Soft
        } else if score < MODERATE_BELOW {
            Self::Moderate
        } else {
            Self::VerySharp
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Soft => "soft/blurred (shallow DOF)",
            Self::Moderate => "moderately sharp",
            Self::VerySharp => "very sharp",
        }
    }
}

/// Color temperature impression of the sampled area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperature {
    Warm,
    CoolNeutral,
}

impl Temperature {
    fn classify(hue: f64, saturation: f64) -> Self {
        if (15.0..=70.0).contains(&hue) && saturation > 0.05 {
            Self::Warm
        } else {
            Self::CoolNeutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Warm => "warm, amber/orange-biased",
            Self::CoolNeutral => "cool/neutral",
        }
    }
}

/// Statistics of one sampled patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalLighting {
    /// Mean red, green and blue (0..=255).
    pub mean: [f64; 3],
    /// Degrees in `[0, 360)`.
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    /// Mean absolute luma step between neighbours, scaled to 0..=1.
    pub sharpness_score: f64,
    pub sharpness: Sharpness,
    pub temperature: Temperature,
}

impl LocalLighting {
    /// Reduces the `size`×`size` patch at (`x`, `y`) of `image`.
    ///
    /// Returns `None` when the patch is empty or leaves the image.
    pub fn measure<I>(image: &I, x: u32, y: u32, size: u32) -> Option<Self>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        if size == 0 || x + size > image.width() || y + size > image.height() {
            return None;
        }

        let mut sums = [0.0_f64; 3];
        let mut gradient = 0.0_f64;
        let mut previous_row = vec![0.0_f64; size as usize];

        for py in 0..size {
            let mut previous = 0.0_f64;
            for (px, above) in (0..size).zip(previous_row.iter_mut()) {
                let Rgb([r, g, b]) = image.get_pixel(x + px, y + py);
                let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
                sums[0] += r;
                sums[1] += g;
                sums[2] += b;

                let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
                if px > 0 {
                    gradient += (luma - previous).abs();
                }
                if py > 0 {
                    gradient += (luma - *above).abs();
                }
                previous = luma;
                *above = luma;
            }
        }

        let count = f64::from(size) * f64::from(size);
        let mean = sums.map(|sum| sum / count);
        let (hue, saturation, lightness) = hsl(mean);

        let comparisons = f64::from(size) * f64::from(size - 1) * 2.0;
        let sharpness_score = if comparisons > 0.0 {
            gradient / (comparisons * 255.0)
        } else {
            0.0
        };

        Some(Self {
            mean,
            hue,
            saturation,
            lightness,
            sharpness_score,
            sharpness: Sharpness::classify(sharpness_score),
            temperature: Temperature::classify(hue, saturation),
        })
    }

    /// Mean color as `#rrggbb`.
    pub fn hex(&self) -> String {
        let [r, g, b] = self.mean.map(|channel| channel.round().clamp(0.0, 255.0) as u8);
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    /// The prompt-conditioning sentence.
    pub fn hint(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LocalLighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Local light near placement is {} (avg {}, hue {}°, sat {}%, lightness {}%). The area appears {}.",
            self.temperature.label(),
            self.hex(),
            self.hue.round(),
            (self.saturation * 100.0).round(),
            (self.lightness * 100.0).round(),
            self.sharpness.label()
        )
    }
}

/// Hue (degrees), saturation and lightness (0..=1) of a mean color.
fn hsl([r, g, b]: [f64; 3]) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 510.0;

    if max == min {
        return (0.0, 0.0, lightness);
    }

    let delta = max - min;
    let saturation = delta / (255.0 - (max + min - 255.0).abs());
    let mut hue = if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    (hue, saturation, lightness)
}

/// Samples the clean normalized scene around `position` and describes it.
///
/// # Errors
///
/// Returns [`AppError::Surface`] if the image has no pixels to sample.
pub fn analyze_region<I>(image: &I, position: RelativePosition, source: Dimensions) -> Result<LocalLighting>
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(AppError::surface("cannot sample an empty image"));
    }

    let patch = SamplePatch::locate(width, height, position, source);
    LocalLighting::measure(image, patch.x, patch.y, patch.size)
        .ok_or_else(|| AppError::surface("sample patch falls outside the image"))
}
