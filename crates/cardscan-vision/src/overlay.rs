// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay rendering — the detected card outline drawn over the live preview.

use cardscan_core::config::OverlayStyle;
use cardscan_core::{SurfaceSize, ViewQuad};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::trace;

/// Widest outline drawn, in pixels. Wider configured strokes are clamped.
pub const MAX_STROKE_WIDTH: u32 = 32;

/// A transparent layer above the camera preview.
///
/// Only the scanner session calls into the surface, always from its own
/// task, so implementations need `Send` but not `Sync`.
pub trait OverlaySurface: Send {
    /// Current drawable size in pixels.
    fn size(&self) -> SurfaceSize;

    /// The preview changed size. Any drawn outline is stale afterwards.
    fn resize(&mut self, size: SurfaceSize);

    /// Replace the drawn outline with `quad`.
    fn draw_quad(&mut self, quad: &ViewQuad);

    /// Remove the outline.
    fn clear(&mut self);
}

/// Overlay backed by an in-memory RGBA buffer.
///
/// Used off-device and in tests; the buffer can be composited over a frame
/// or written out as a preview image.
pub struct RasterOverlay {
    canvas: RgbaImage,
    size: SurfaceSize,
    style: OverlayStyle,
    current: Option<ViewQuad>,
}

impl RasterOverlay {
    pub fn new(size: SurfaceSize, style: OverlayStyle) -> Self {
        Self {
            canvas: blank_canvas(size),
            size,
            style,
            current: None,
        }
    }

    /// The outline currently drawn, if any.
    pub fn current(&self) -> Option<&ViewQuad> {
        self.current.as_ref()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Blend the overlay onto `background`, which must match the canvas size.
    pub fn composite_onto(&self, background: &mut RgbaImage) {
        if background.dimensions() != self.canvas.dimensions() {
            trace!("Composite skipped: background size differs from overlay");
            return;
        }
        for (dst, src) in background.pixels_mut().zip(self.canvas.pixels()) {
            if src.0[3] > 0 {
                *dst = *src;
            }
        }
    }

    fn stroke(&mut self, quad: &ViewQuad) {
        let colour = Rgba(self.style.stroke_rgba);
        let width = self.style.stroke_width.clamp(1, MAX_STROKE_WIDTH) as i32;
        let outline = quad.outline();
        for pair in outline.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            // Thick strokes as parallel offsets of a one-pixel segment.
            for offset in -(width / 2)..=((width - 1) / 2) {
                let d = offset as f32;
                let horizontal = (b.x - a.x).abs() >= (b.y - a.y).abs();
                let (dx, dy) = if horizontal { (0.0, d) } else { (d, 0.0) };
                draw_line_segment_mut(
                    &mut self.canvas,
                    (a.x + dx, a.y + dy),
                    (b.x + dx, b.y + dy),
                    colour,
                );
            }
        }
    }
}

impl OverlaySurface for RasterOverlay {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        self.canvas = blank_canvas(size);
        self.current = None;
    }

    fn draw_quad(&mut self, quad: &ViewQuad) {
        self.canvas = blank_canvas(self.size);
        self.stroke(quad);
        self.current = Some(*quad);
    }

    fn clear(&mut self) {
        self.canvas = blank_canvas(self.size);
        self.current = None;
    }
}

fn blank_canvas(size: SurfaceSize) -> RgbaImage {
    RgbaImage::new(size.width().ceil() as u32, size.height().ceil() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscan_core::{NormalizedQuad, Point, map_to_surface};

    fn inset_quad(size: SurfaceSize) -> ViewQuad {
        let quad = NormalizedQuad::new(
            Point::new(0.1, 0.9),
            Point::new(0.9, 0.9),
            Point::new(0.1, 0.1),
            Point::new(0.9, 0.1),
        )
        .expect("quad");
        map_to_surface(&quad, size)
    }

    fn painted(overlay: &RasterOverlay) -> usize {
        overlay.canvas().pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn draw_paints_outline_only() {
        let size = SurfaceSize::new(100.0, 100.0).expect("size");
        let mut overlay = RasterOverlay::new(size, OverlayStyle::default());
        overlay.draw_quad(&inset_quad(size));

        let canvas = overlay.canvas();
        assert_eq!(canvas.get_pixel(10, 50).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(50, 10).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(50, 50).0[3], 0, "interior stays transparent");
        assert!(overlay.current().is_some());
    }

    #[test]
    fn oversized_stroke_is_clamped() {
        let size = SurfaceSize::new(100.0, 100.0).expect("size");
        let style = OverlayStyle {
            stroke_width: u32::MAX,
            ..OverlayStyle::default()
        };
        let mut overlay = RasterOverlay::new(size, style);
        overlay.draw_quad(&inset_quad(size));

        let canvas = overlay.canvas();
        assert_eq!(canvas.get_pixel(10, 50).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(50, 50).0[3], 0, "interior stays transparent");
    }

    #[test]
    fn clear_erases_outline() {
        let size = SurfaceSize::new(64.0, 64.0).expect("size");
        let mut overlay = RasterOverlay::new(size, OverlayStyle::default());
        overlay.draw_quad(&inset_quad(size));
        assert!(painted(&overlay) > 0);

        overlay.clear();
        assert_eq!(painted(&overlay), 0);
        assert!(overlay.current().is_none());
    }

    #[test]
    fn redraw_replaces_previous_outline() {
        let size = SurfaceSize::new(100.0, 100.0).expect("size");
        let style = OverlayStyle {
            stroke_width: 1,
            ..OverlayStyle::default()
        };
        let mut overlay = RasterOverlay::new(size, style);
        overlay.draw_quad(&inset_quad(size));
        let first = painted(&overlay);
        overlay.draw_quad(&inset_quad(size));
        assert_eq!(painted(&overlay), first);
    }

    #[test]
    fn resize_drops_stale_outline() {
        let size = SurfaceSize::new(50.0, 80.0).expect("size");
        let mut overlay = RasterOverlay::new(size, OverlayStyle::default());
        overlay.draw_quad(&inset_quad(size));

        let bigger = SurfaceSize::new(120.0, 200.0).expect("size");
        overlay.resize(bigger);
        assert_eq!(overlay.canvas().dimensions(), (120, 200));
        assert!(overlay.current().is_none());
        assert_eq!(painted(&overlay), 0);
    }

    #[test]
    fn composite_copies_opaque_pixels() {
        let size = SurfaceSize::new(40.0, 40.0).expect("size");
        let mut overlay = RasterOverlay::new(size, OverlayStyle::default());
        overlay.draw_quad(&inset_quad(size));

        let mut background = RgbaImage::from_pixel(40, 40, Rgba([0, 255, 0, 255]));
        overlay.composite_onto(&mut background);
        assert_eq!(background.get_pixel(4, 20).0, [255, 0, 0, 255]);
        assert_eq!(background.get_pixel(20, 20).0, [0, 255, 0, 255]);
    }
}
