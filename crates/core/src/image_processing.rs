//! Image decoding, letterboxing, restoring and encoding.
//!
//! This module turns arbitrary product and scene photos into the padded
//! squares the models expect, and crops the model's square output back to
//! the scene's original aspect ratio.
//!
//! # Padding
//!
//! Sources are scaled to fit a `target`×`target` canvas, centered, and the
//! remaining border is filled with mid-gray. Dark borders tend to drag the
//! model's exposure down; gray keeps relighting neutral. The content bounds
//! come from [`geometry::content_rect`](crate::geometry::content_rect), the
//! same formula the marker, the analyzer and the restorer use.

use crate::error::{AppError, Result};
use crate::geometry::{Dimensions, content_rect};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgba, RgbImage, RgbaImage};
use std::io::Cursor;

/// Mid-gray fill used for letterbox padding.
pub const NEUTRAL_FILL: [u8; 3] = [0x80, 0x80, 0x80];

/// JPEG quality for every artifact produced by the pipeline.
pub const JPEG_QUALITY: u8 = 95;

/// Largest square side we are willing to allocate.
pub const MAX_TARGET_DIMENSION: u32 = 8192;

/// Encoded raster bytes plus their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new("image/jpeg", bytes)
    }

    /// Decodes an inline payload as delivered by the model API.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self> {
        let bytes = BASE64.decode(data.trim())?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Parses a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| AppError::decode("not a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::decode("data URL has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::decode("data URL is not base64 encoded"))?;
        Self::from_base64(mime_type, payload)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// A padded square raster together with its transport encoding.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    raster: RgbImage,
    encoded: EncodedImage,
}

impl NormalizedImage {
    /// Pixels of the square, before lossy encoding.
    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    pub fn encoded(&self) -> &EncodedImage {
        &self.encoded
    }

    /// Side length of the square.
    pub fn side(&self) -> u32 {
        self.raster.width()
    }
}

/// Image processing utilities for the compositing pipeline.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Reads the displayed size of an encoded image without decoding pixels.
    ///
    /// EXIF orientation is honored, so a portrait phone photo stored
    /// sideways reports its portrait size.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if the format is unknown, the header is
    /// unreadable, or the image has no area.
    pub fn measure(bytes: &[u8]) -> Result<Dimensions> {
        let (decoder, orientation) = Self::open(bytes)?;
        let (width, height) = decoder.dimensions();
        let (width, height) = if swaps_axes(orientation) {
            (height, width)
        } else {
            (width, height)
        };

        if width == 0 || height == 0 {
            return Err(AppError::decode("image has zero width or height"));
        }
        Ok(Dimensions::new(width, height))
    }

    /// Decodes encoded image bytes into pixels, upright.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if the bytes are not a supported image.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        let (decoder, orientation) = Self::open(bytes)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(|e| AppError::decode(e.to_string()))?;
        image.apply_orientation(orientation);
        Ok(image)
    }

    fn open(bytes: &[u8]) -> Result<(impl ImageDecoder + '_, Orientation)> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AppError::decode(format!("Failed to read image: {}", e)))?
            .into_decoder()
            .map_err(|e| AppError::decode(e.to_string()))?;
        // Unreadable metadata is treated as upright.
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        Ok((decoder, orientation))
    }

    /// Letterboxes `source` into a gray `target`×`target` square and encodes it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Surface`] for a zero or oversized target,
    /// [`AppError::Decode`] for an empty source and [`AppError::Encode`] if
    /// JPEG encoding fails.
    pub fn normalize(source: &DynamicImage, target: u32) -> Result<NormalizedImage> {
        let raster = Self::letterbox(source, target)?;
        let encoded = Self::encode_jpeg(&raster)?;
        Ok(NormalizedImage { raster, encoded })
    }

    /// Pixel half of [`normalize`](Self::normalize): no encoding.
    ///
    /// # Errors
    ///
    /// Same surface and decode conditions as [`normalize`](Self::normalize).
    pub fn letterbox(source: &DynamicImage, target: u32) -> Result<RgbImage> {
        Self::check_target(target)?;
        if source.width() == 0 || source.height() == 0 {
            return Err(AppError::decode("image has zero width or height"));
        }

        let dimensions = Dimensions::new(source.width(), source.height());
        let bounds = content_rect(dimensions, target).pixel_bounds(target);

        let resized = source
            .resize_exact(bounds.width, bounds.height, FilterType::Lanczos3)
            .to_rgba8();

        let [r, g, b] = NEUTRAL_FILL;
        let mut canvas = RgbaImage::from_pixel(target, target, Rgba([r, g, b, 255]));
        // Alpha-composite so transparent product cut-outs show the gray fill.
        imageops::overlay(&mut canvas, &resized, i64::from(bounds.x), i64::from(bounds.y));

        Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
    }

    /// Crops a model output square back to the content area of `original`.
    ///
    /// The crop bounds are recomputed from the original dimensions exactly as
    /// [`normalize`](Self::normalize) computed the padding. An output whose
    /// size differs from `target`×`target` is first resampled onto that
    /// square so the same bounds apply.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Surface`] for a zero or oversized target and
    /// [`AppError::Decode`] for an empty input image.
    pub fn restore_aspect(square: &DynamicImage, original: Dimensions, target: u32) -> Result<RgbImage> {
        Self::check_target(target)?;
        if square.width() == 0 || square.height() == 0 {
            return Err(AppError::decode("generated image has zero width or height"));
        }

        let frame = if square.width() == target && square.height() == target {
            square.to_rgb8()
        } else {
            if square.width() != square.height() {
                log::warn!(
                    "Model returned a {}x{} image, stretching onto the {}px square",
                    square.width(),
                    square.height(),
                    target
                );
            }
            square
                .resize_exact(target, target, FilterType::Lanczos3)
                .to_rgb8()
        };

        let bounds = content_rect(original, target).pixel_bounds(target);
        Ok(imageops::crop_imm(&frame, bounds.x, bounds.y, bounds.width, bounds.height).to_image())
    }

    /// Encodes an RGB raster as JPEG at [`JPEG_QUALITY`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Encode`] if the encoder rejects the image.
    pub fn encode_jpeg(image: &RgbImage) -> Result<EncodedImage> {
        let mut buffer: Vec<u8> = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
            encoder
                .encode_image(image)
                .map_err(|e| AppError::encode(e.to_string()))?;
        }
        Ok(EncodedImage::jpeg(buffer))
    }

    fn check_target(target: u32) -> Result<()> {
        if target == 0 || target > MAX_TARGET_DIMENSION {
            return Err(AppError::surface(format!(
                "target dimension {} is outside 1..={}",
                target, MAX_TARGET_DIMENSION
            )));
        }
        Ok(())
    }
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}
