//! Placement marker drawing.
//!
//! The marked square is what the description model looks at and what the
//! user sees as the debug image. The clean square is never drawn on.

use crate::geometry::{Dimensions, PixelPosition, RelativePosition, placement_point};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

pub const MARKER_FILL: Rgb<u8> = Rgb([255, 0, 0]);
pub const MARKER_OUTLINE: Rgb<u8> = Rgb([255, 255, 255]);

/// Smallest radius a marker is drawn with.
pub const MIN_MARKER_RADIUS: f64 = 5.0;

/// Where and how large a marker is on a normalized square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub center: PixelPosition,
    pub radius: f64,
}

impl Marker {
    /// Locates the marker for `position` on a `width`×`height` normalized
    /// canvas letterboxing an image of size `source`.
    pub fn locate(width: u32, height: u32, position: RelativePosition, source: Dimensions) -> Self {
        let radius = (width.min(height) as f64 * 0.015).max(MIN_MARKER_RADIUS);
        Self {
            center: placement_point(source, width, position),
            radius,
        }
    }

    /// Stroke width of the contrasting ring.
    pub fn outline_width(&self) -> f64 {
        self.radius * 0.2
    }
}

/// Returns a copy of `normalized` with a red, white-ringed disc at `position`.
pub fn draw_marker(normalized: &RgbImage, position: RelativePosition, source: Dimensions) -> RgbImage {
    let marker = Marker::locate(normalized.width(), normalized.height(), position, source);
    let mut marked = normalized.clone();

    let center = (marker.center.x.round() as i32, marker.center.y.round() as i32);
    let half_stroke = marker.outline_width() / 2.0;

    // The ring straddles the nominal radius, so paint it as a larger disc first.
    draw_filled_circle_mut(&mut marked, center, (marker.radius + half_stroke).round() as i32, MARKER_OUTLINE);
    draw_filled_circle_mut(&mut marked, center, (marker.radius - half_stroke).round() as i32, MARKER_FILL);

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::content_rect;
    use crate::lighting::SamplePatch;

    const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

    #[test]
    fn marker_lands_on_the_mapped_point() {
        let canvas = RgbImage::from_pixel(1024, 1024, GRAY);
        let source = Dimensions::new(1200, 800);
        let marked = draw_marker(&canvas, RelativePosition::new(25.0, 25.0), source);

        // 25% of the 682.67px content band below its 170.67px offset.
        let expected_y = (170.666_666 + 0.25 * 682.666_666_f64).round() as u32;
        assert_eq!(*marked.get_pixel(256, expected_y), MARKER_FILL);
        assert_eq!(*marked.get_pixel(256 + 16, expected_y), MARKER_OUTLINE);
        assert_eq!(*marked.get_pixel(256 + 25, expected_y), GRAY);
        assert_eq!(*marked.get_pixel(512, 512), GRAY);
    }

    #[test]
    fn input_is_left_untouched() {
        let canvas = RgbImage::from_pixel(256, 256, GRAY);
        let marked = draw_marker(&canvas, RelativePosition::CENTER, Dimensions::new(10, 10));
        assert!(canvas.pixels().all(|p| *p == GRAY));
        assert_eq!(*marked.get_pixel(128, 128), MARKER_FILL);
    }

    #[test]
    fn radius_has_a_floor() {
        let small = Marker::locate(100, 100, RelativePosition::CENTER, Dimensions::new(1, 1));
        assert_eq!(small.radius, MIN_MARKER_RADIUS);
        let large = Marker::locate(2000, 2000, RelativePosition::CENTER, Dimensions::new(1, 1));
        assert!((large.radius - 30.0).abs() < 1e-9);
        assert!((large.outline_width() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn marker_and_sample_patch_agree_on_the_placement() {
        let sources = [
            Dimensions::new(1200, 800),
            Dimensions::new(600, 800),
            Dimensions::new(700, 700),
        ];
        let percents = [0.0, 50.0, 100.0];

        for source in sources {
            let content = content_rect(source, 1024);
            for x in percents {
                for y in percents {
                    let position = RelativePosition::new(x, y);
                    let marker = Marker::locate(1024, 1024, position, source);
                    let patch = SamplePatch::locate(1024, 1024, position, source);
                    assert_eq!(marker.center, patch.center, "{:?} at {:?}", source, position);

                    assert!(marker.center.x >= content.x && marker.center.x <= content.x + content.width);
                    assert!(marker.center.y >= content.y && marker.center.y <= content.y + content.height);
                }
            }
        }
    }
}
