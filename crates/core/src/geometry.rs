//! Coordinate mapping between screen space, padded squares and image content.
//!
//! Every component of the pipeline agrees on where the image content sits
//! inside a letterboxed area by calling [`fit_rect`] (or its square special
//! case [`content_rect`]). The Normalizer pads with it, the Marker Compositor
//! and the Region Analyzer locate the placement with it, and the Aspect
//! Restorer crops with it.
//!
//! # Coordinate spaces
//!
//! - **Client**: raw pointer/touch coordinates as reported by the view layer.
//! - **Container**: client coordinates minus the container's top-left corner.
//! - **Content**: percentages of the rendered image, ignoring letterbox
//!   padding. This is the only durable representation of a placement.

use serde::{Deserialize, Serialize};

/// Intrinsic pixel size of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A placement point as percentages (0-100) of the unpadded content area.
///
/// Only meaningful together with the [`Dimensions`] it was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativePosition {
    pub x_percent: f64,
    pub y_percent: f64,
}

impl RelativePosition {
    pub const CENTER: Self = Self {
        x_percent: 50.0,
        y_percent: 50.0,
    };

    pub fn new(x_percent: f64, y_percent: f64) -> Self {
        Self {
            x_percent,
            y_percent,
        }
    }

    /// Returns true when both axes lie in `[0, 100]`.
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.x_percent) && (0.0..=100.0).contains(&self.y_percent)
    }
}

/// A point in container-local (or canvas) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

/// Bounding rectangle of the element that displays an image, in client space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A container anchored at the client origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Sub-rectangle occupied by image content inside a letterboxed area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer pixel bounds of a [`Rect`], always inside the square it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Absolute coordinate of a content-relative position.
    pub fn point_at(&self, position: RelativePosition) -> PixelPosition {
        PixelPosition {
            x: self.x + (position.x_percent / 100.0) * self.width,
            y: self.y + (position.y_percent / 100.0) * self.height,
        }
    }

    /// Rounds the rectangle to whole pixels inside a `side`×`side` square.
    ///
    /// Width and height are at least one pixel; the offset is pulled back so
    /// the bounds never overhang the square.
    pub fn pixel_bounds(&self, side: u32) -> PixelBounds {
        let limit = side.max(1);
        let width = (self.width.round().max(1.0) as u32).min(limit);
        let height = (self.height.round().max(1.0) as u32).min(limit);
        let x = (self.x.round().max(0.0) as u32).min(limit - width);
        let y = (self.y.round().max(0.0) as u32).min(limit - height);
        PixelBounds {
            x,
            y,
            width,
            height,
        }
    }
}

/// Computes the aspect-fit ("contain") rectangle of `source` inside a
/// `container_width`×`container_height` box, centered on both axes.
///
/// Returns `None` when either the source or the container has no area.
pub fn fit_rect(source: Dimensions, container_width: f64, container_height: f64) -> Option<Rect> {
    if source.width == 0 || source.height == 0 {
        return None;
    }
    if !(container_width > 0.0 && container_height > 0.0) {
        return None;
    }

    let image_aspect = source.aspect_ratio();
    let container_aspect = container_width / container_height;

    let (width, height) = if image_aspect > container_aspect {
        (container_width, container_width / image_aspect)
    } else {
        (container_height * image_aspect, container_height)
    };

    Some(Rect {
        x: (container_width - width) / 2.0,
        y: (container_height - height) / 2.0,
        width,
        height,
    })
}

/// Content sub-rectangle of `source` letterboxed into a `side`×`side` square.
///
/// Degenerate sources fall back to the whole square.
pub fn content_rect(source: Dimensions, side: u32) -> Rect {
    let side = side as f64;
    fit_rect(source, side, side).unwrap_or(Rect {
        x: 0.0,
        y: 0.0,
        width: side,
        height: side,
    })
}

/// Absolute canvas coordinate of a placement on a normalized square.
pub fn placement_point(source: Dimensions, side: u32, position: RelativePosition) -> PixelPosition {
    content_rect(source, side).point_at(position)
}

/// Result of mapping a pointer event onto an aspect-fit image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMapping {
    /// Container-local point, for drawing a transient on-screen marker.
    pub position: PixelPosition,
    /// Durable content-relative placement.
    pub relative: RelativePosition,
}

/// Maps a client coordinate over an aspect-fit image onto its content.
///
/// Points on the letterbox padding yield `None`; they are never clamped
/// into the image. Mouse clicks, drags and touches all go through here.
pub fn map_point_to_content(
    source: Dimensions,
    container: ContainerRect,
    client_x: f64,
    client_y: f64,
) -> Option<PointMapping> {
    let rendered = fit_rect(source, container.width, container.height)?;

    let local_x = client_x - container.left;
    let local_y = client_y - container.top;

    let image_x = local_x - rendered.x;
    let image_y = local_y - rendered.y;

    if !(0.0..=rendered.width).contains(&image_x) || !(0.0..=rendered.height).contains(&image_y) {
        return None;
    }

    Some(PointMapping {
        position: PixelPosition {
            x: local_x,
            y: local_y,
        },
        relative: RelativePosition {
            x_percent: image_x / rendered.width * 100.0,
            y_percent: image_y / rendered.height * 100.0,
        },
    })
}

/// Inverse of [`map_point_to_content`]: where a stored placement lands in a
/// container of the given size.
pub fn content_point_in_container(
    source: Dimensions,
    container_width: f64,
    container_height: f64,
    position: RelativePosition,
) -> Option<PixelPosition> {
    fit_rect(source, container_width, container_height).map(|rect| rect.point_at(position))
}
