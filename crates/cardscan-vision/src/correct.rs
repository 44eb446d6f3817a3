// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction — flatten a quadrilateral region of a frame onto an
// axis-aligned rectangle.

use cardscan_core::error::{CardscanError, Result};
use cardscan_core::{Frame, ViewQuad};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument};

use crate::frame::frame_to_rgba;

/// Turns a quadrilateral of a frame into a rectangular image.
///
/// `quad` is in the frame's own pixel space (top-left origin).
pub trait PerspectiveCorrector: Send + Sync {
    fn correct(&self, frame: &Frame, quad: &ViewQuad) -> Result<RgbaImage>;
}

/// Projective warp via `imageproc`.
///
/// The output rectangle takes the mean length of the top and bottom edges as
/// its width and the mean of the left and right edges as its height, so a
/// card photographed at an angle comes out at roughly its apparent size.
#[derive(Debug, Clone)]
pub struct ProjectionCorrector {
    background: Rgba<u8>,
    /// Longest output side; larger results are scaled down uniformly.
    max_dimension: Option<u32>,
}

impl Default for ProjectionCorrector {
    fn default() -> Self {
        Self {
            background: Rgba([255, 255, 255, 255]),
            max_dimension: None,
        }
    }
}

impl ProjectionCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }

    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self
    }

    /// Output size for `quad`, after the optional dimension cap.
    pub fn output_size(&self, quad: &ViewQuad) -> Result<(u32, u32)> {
        let width = (quad.top_left.distance(&quad.top_right)
            + quad.bottom_left.distance(&quad.bottom_right))
            / 2.0;
        let height = (quad.top_left.distance(&quad.bottom_left)
            + quad.top_right.distance(&quad.bottom_right))
            / 2.0;

        let scale = match self.max_dimension {
            Some(max) if width.max(height) > max as f32 => max as f32 / width.max(height),
            _ => 1.0,
        };
        let (out_w, out_h) = ((width * scale).round(), (height * scale).round());
        if !(out_w >= 1.0 && out_h >= 1.0) {
            return Err(CardscanError::Correction(format!(
                "degenerate quadrilateral ({width:.1} x {height:.1} px)"
            )));
        }
        Ok((out_w as u32, out_h as u32))
    }
}

impl PerspectiveCorrector for ProjectionCorrector {
    #[instrument(skip_all, fields(frame = %frame.id()))]
    fn correct(&self, frame: &Frame, quad: &ViewQuad) -> Result<RgbaImage> {
        let (out_w, out_h) = self.output_size(quad)?;

        let src = quad.corners().map(|p| (p.x, p.y));
        let dest: [(f32, f32); 4] = [
            (0.0, 0.0),                   // top-left
            (out_w as f32, 0.0),          // top-right
            (out_w as f32, out_h as f32), // bottom-right
            (0.0, out_h as f32),          // bottom-left
        ];

        // from_control_points computes the mapping from `src` to `dest`.
        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            CardscanError::Correction("corners do not define a projective transform".into())
        })?;
        debug!(?src, out_w, out_h, "Projective transform computed");

        let input = frame_to_rgba(frame)?;
        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(&input, &projection, Interpolation::Bilinear, self.background, &mut output);

        info!(out_w, out_h, "Perspective correction applied");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::frame_from_image;
    use cardscan_core::Point;
    use image::DynamicImage;

    fn quad(tl: (f32, f32), tr: (f32, f32), br: (f32, f32), bl: (f32, f32)) -> ViewQuad {
        ViewQuad {
            top_left: tl.into(),
            top_right: tr.into(),
            bottom_right: br.into(),
            bottom_left: bl.into(),
        }
    }

    /// Left half red, right half blue.
    fn split_frame() -> Frame {
        let img = RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) }
        });
        frame_from_image(&DynamicImage::ImageRgba8(img)).expect("frame")
    }

    #[test]
    fn output_size_follows_edge_lengths() {
        let q = quad((10.0, 10.0), (170.0, 10.0), (170.0, 110.0), (10.0, 110.0));
        assert_eq!(ProjectionCorrector::new().output_size(&q).expect("size"), (160, 100));
    }

    #[test]
    fn output_size_respects_cap() {
        let q = quad((0.0, 0.0), (400.0, 0.0), (400.0, 200.0), (0.0, 200.0));
        let size = ProjectionCorrector::new()
            .with_max_dimension(100)
            .output_size(&q)
            .expect("size");
        assert_eq!(size, (100, 50));
    }

    #[test]
    fn degenerate_quad_rejected() {
        let p = Point::new(5.0, 5.0);
        let q = ViewQuad {
            top_left: p,
            top_right: p,
            bottom_right: p,
            bottom_left: p,
        };
        let err = ProjectionCorrector::new().correct(&split_frame(), &q);
        assert!(matches!(err, Err(CardscanError::Correction(_))));
    }

    #[test]
    fn identity_region_keeps_content() {
        let frame = split_frame();
        let q = quad((0.0, 0.0), (200.0, 0.0), (200.0, 100.0), (0.0, 100.0));
        let out = ProjectionCorrector::new().correct(&frame, &q).expect("correct");

        assert_eq!(out.dimensions(), (200, 100));
        assert_eq!(out.get_pixel(20, 50).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(180, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn crops_right_half() {
        let frame = split_frame();
        let q = quad((110.0, 10.0), (190.0, 10.0), (190.0, 90.0), (110.0, 90.0));
        let out = ProjectionCorrector::new().correct(&frame, &q).expect("correct");

        assert_eq!(out.dimensions(), (80, 80));
        assert!(out.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }
}
