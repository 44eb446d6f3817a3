// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral geometry — normalized detector output, pixel-space view quads,
// and the coordinate mapper between them.

use serde::{Deserialize, Serialize};

use crate::error::{CardscanError, Result};

/// A 2D point. The coordinate system depends on the owning type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of a drawing surface or image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSurfaceSize")]
pub struct SurfaceSize {
    width: f32,
    height: f32,
}

impl SurfaceSize {
    /// Both dimensions must be finite and strictly positive.
    pub fn new(width: f32, height: f32) -> Result<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(CardscanError::InvalidFrame(format!(
                "surface size must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Size of an integer-dimensioned buffer. Zero dimensions are rejected.
    pub fn from_pixels(width: u32, height: u32) -> Result<Self> {
        Self::new(width as f32, height as f32)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

#[derive(Deserialize)]
struct RawSurfaceSize {
    width: f32,
    height: f32,
}

impl TryFrom<RawSurfaceSize> for SurfaceSize {
    type Error = CardscanError;

    fn try_from(raw: RawSurfaceSize) -> Result<Self> {
        Self::new(raw.width, raw.height)
    }
}

/// A quadrilateral in normalized image coordinates, as emitted by a detector.
///
/// Every coordinate lies in `[0, 1]` and the origin is the **bottom-left**
/// corner of the image, so `top_left.y` is larger than `bottom_left.y` for an
/// upright card. Fields are private and deserialization goes through
/// [`NormalizedQuad::new`], so a `NormalizedQuad` is always range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuad")]
pub struct NormalizedQuad {
    top_left: Point,
    top_right: Point,
    bottom_left: Point,
    bottom_right: Point,
}

impl NormalizedQuad {
    /// Build a quad, rejecting any non-finite or out-of-range coordinate.
    pub fn new(
        top_left: Point,
        top_right: Point,
        bottom_left: Point,
        bottom_right: Point,
    ) -> Result<Self> {
        for (name, p) in [
            ("top_left", top_left),
            ("top_right", top_right),
            ("bottom_left", bottom_left),
            ("bottom_right", bottom_right),
        ] {
            let in_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
            if !in_range(p.x) || !in_range(p.y) {
                return Err(CardscanError::InvalidQuad(format!(
                    "{name} ({}, {}) outside the unit square",
                    p.x, p.y
                )));
            }
        }
        Ok(Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        })
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn top_right(&self) -> Point {
        self.top_right
    }

    pub fn bottom_left(&self) -> Point {
        self.bottom_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }
}

#[derive(Deserialize)]
struct RawQuad {
    top_left: Point,
    top_right: Point,
    bottom_left: Point,
    bottom_right: Point,
}

impl TryFrom<RawQuad> for NormalizedQuad {
    type Error = CardscanError;

    fn try_from(raw: RawQuad) -> Result<Self> {
        Self::new(raw.top_left, raw.top_right, raw.bottom_left, raw.bottom_right)
    }
}

/// A quadrilateral in pixel space of a top-left-origin surface (y down).
///
/// Used for overlay rendering against the preview surface and, mapped
/// against frame dimensions, as the source region for perspective correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl ViewQuad {
    /// Closed outline in drawing order, ending where it started.
    pub fn outline(&self) -> [Point; 5] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
            self.top_left,
        ]
    }

    /// Corners clockwise from the top-left (on screen).
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Area via the shoelace formula.
    pub fn area(&self) -> f32 {
        let c = self.corners();
        let mut twice = 0.0f32;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += c[i].x * c[j].y - c[j].x * c[i].y;
        }
        twice.abs() / 2.0
    }
}

/// Map a normalized quad onto a surface of the given pixel size.
///
/// Each corner is scaled by `(width, height)` and then flipped vertically
/// (`y' = height - y`) to move from the detector's bottom-left origin to the
/// top-left origin of 2D drawing surfaces. No rotation or aspect correction
/// is applied; source and surface share the portrait orientation.
pub fn map_to_surface(quad: &NormalizedQuad, size: SurfaceSize) -> ViewQuad {
    let map = |p: Point| Point {
        x: p.x * size.width,
        y: size.height - p.y * size.height,
    };
    ViewQuad {
        top_left: map(quad.top_left),
        top_right: map(quad.top_right),
        bottom_left: map(quad.bottom_left),
        bottom_right: map(quad.bottom_right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> NormalizedQuad {
        NormalizedQuad::new(
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        )
        .expect("unit quad")
    }

    #[test]
    fn unit_quad_maps_to_surface_corners() {
        let size = SurfaceSize::new(100.0, 100.0).expect("size");
        let view = map_to_surface(&unit_quad(), size);

        assert_eq!(view.top_left, Point::new(0.0, 0.0));
        assert_eq!(view.top_right, Point::new(100.0, 0.0));
        assert_eq!(view.bottom_left, Point::new(0.0, 100.0));
        assert_eq!(view.bottom_right, Point::new(100.0, 100.0));
    }

    #[test]
    fn mapped_points_stay_within_surface() {
        let samples = [0.0f32, 0.013, 0.25, 0.5, 0.77, 0.999, 1.0];
        let sizes = [(1.0f32, 1.0f32), (390.0, 844.0), (1080.0, 1920.0), (0.5, 3.0)];

        for &(w, h) in &sizes {
            let size = SurfaceSize::new(w, h).expect("size");
            for &a in &samples {
                for &b in &samples {
                    let quad = NormalizedQuad::new(
                        Point::new(a, b),
                        Point::new(b, a),
                        Point::new(a, a),
                        Point::new(b, b),
                    )
                    .expect("quad");
                    for p in map_to_surface(&quad, size).corners() {
                        assert!((0.0..=w).contains(&p.x), "x {} outside [0, {w}]", p.x);
                        assert!((0.0..=h).contains(&p.y), "y {} outside [0, {h}]", p.y);
                    }
                }
            }
        }
    }

    #[test]
    fn mapping_is_pure() {
        let quad = NormalizedQuad::new(
            Point::new(0.2, 0.8),
            Point::new(0.7, 0.75),
            Point::new(0.25, 0.3),
            Point::new(0.8, 0.35),
        )
        .expect("quad");
        let size = SurfaceSize::new(390.0, 844.0).expect("size");

        let first = map_to_surface(&quad, size);
        let second = map_to_surface(&quad, size);
        assert_eq!(first, second);
    }

    #[test]
    fn vertical_flip_applied() {
        let quad = NormalizedQuad::new(
            Point::new(0.25, 0.75),
            Point::new(0.75, 0.75),
            Point::new(0.25, 0.25),
            Point::new(0.75, 0.25),
        )
        .expect("quad");
        let size = SurfaceSize::new(200.0, 400.0).expect("size");
        let view = map_to_surface(&quad, size);

        // Normalized y = 0.75 sits a quarter of the way down the surface.
        assert_eq!(view.top_left, Point::new(50.0, 100.0));
        assert_eq!(view.bottom_right, Point::new(150.0, 300.0));
    }

    #[test]
    fn out_of_range_quad_rejected() {
        let err = NormalizedQuad::new(
            Point::new(0.0, 1.2),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        );
        assert!(matches!(err, Err(CardscanError::InvalidQuad(_))));

        let nan = NormalizedQuad::new(
            Point::new(f32::NAN, 0.5),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        );
        assert!(nan.is_err());
    }

    #[test]
    fn zero_surface_rejected() {
        assert!(SurfaceSize::new(0.0, 10.0).is_err());
        assert!(SurfaceSize::new(10.0, -1.0).is_err());
        assert!(SurfaceSize::from_pixels(0, 0).is_err());
    }

    #[test]
    fn outline_is_closed() {
        let size = SurfaceSize::new(10.0, 10.0).expect("size");
        let outline = map_to_surface(&unit_quad(), size).outline();
        assert_eq!(outline[0], outline[4]);
        assert_eq!(outline[2], Point::new(10.0, 10.0));
    }

    #[test]
    fn view_quad_area() {
        let size = SurfaceSize::new(10.0, 5.0).expect("size");
        let view = map_to_surface(&unit_quad(), size);
        assert!((view.area() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn deserialized_quad_is_range_checked() {
        let json = r#"{
            "top_left": { "x": -5.0, "y": 3.0 },
            "top_right": { "x": 1.0, "y": 1.0 },
            "bottom_left": { "x": 0.0, "y": 0.0 },
            "bottom_right": { "x": 1.0, "y": 0.0 }
        }"#;
        let err = serde_json::from_str::<NormalizedQuad>(json).expect_err("out of range");
        assert!(err.to_string().contains("top_left"), "{err}");

        let valid = serde_json::to_string(&unit_quad()).expect("serialize");
        let back: NormalizedQuad = serde_json::from_str(&valid).expect("in range");
        assert_eq!(back, unit_quad());
    }

    #[test]
    fn deserialized_surface_size_is_checked() {
        assert!(serde_json::from_str::<SurfaceSize>(r#"{ "width": 0.0, "height": 10.0 }"#).is_err());
        let size: SurfaceSize =
            serde_json::from_str(r#"{ "width": 390.0, "height": 844.0 }"#).expect("valid size");
        assert_eq!((size.width(), size.height()), (390.0, 844.0));
    }
}
