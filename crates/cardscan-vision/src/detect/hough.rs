// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge-based card detector: Canny edges, Hough lines, and line intersection,
// validated against the card shape constraints.

use cardscan_core::config::DetectionConstraints;
use cardscan_core::error::Result;
use cardscan_core::{Frame, NormalizedQuad, Point};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument, trace};

use super::{DetectionTicket, QuadDetector};
use crate::frame::frame_to_luma;

/// Tuning for the edge and line stages.
#[derive(Debug, Clone)]
pub struct HoughOptions {
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Vote threshold as a fraction of the shortest acceptable card side.
    pub vote_ratio: f32,
    /// Floor for the vote threshold on tiny frames.
    pub min_votes: u32,
    /// Non-maximum suppression radius in Hough space.
    pub suppression_radius: u32,
    /// Maximum deviation, in degrees, from axis-aligned for a line to count
    /// as a card edge.
    pub angle_tolerance: u32,
}

impl Default for HoughOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 2.0,
            canny_low: 50.0,
            canny_high: 150.0,
            vote_ratio: 0.75,
            min_votes: 40,
            suppression_radius: 8,
            angle_tolerance: 20,
        }
    }
}

/// Portable card detector built on `imageproc`.
///
/// ## Pipeline
///
/// 1. Luminance straight from the BGRA frame
/// 2. Gaussian blur for noise reduction
/// 3. Canny edge detection
/// 4. Hough line detection, vote threshold scaled to the minimum card size
/// 5. Split lines into horizontal and vertical families by normal angle
/// 6. Take the outermost line on each side
/// 7. Intersect into four corners
/// 8. Check aspect ratio and size, then normalize with a vertical flip
///
/// The ticket is checked between the expensive stages.
#[derive(Debug, Clone, Default)]
pub struct HoughQuadDetector {
    constraints: DetectionConstraints,
    options: HoughOptions,
}

impl HoughQuadDetector {
    pub fn new(constraints: DetectionConstraints) -> Self {
        Self {
            constraints,
            options: HoughOptions::default(),
        }
    }

    pub fn with_options(mut self, options: HoughOptions) -> Self {
        self.options = options;
        self
    }

    pub fn constraints(&self) -> &DetectionConstraints {
        &self.constraints
    }

    /// Run the pipeline, returning the corners in frame pixels
    /// `[top_left, top_right, bottom_right, bottom_left]`.
    fn find_corners(&self, frame: &Frame, ticket: &DetectionTicket) -> Option<[Point; 4]> {
        let (w, h) = (frame.width(), frame.height());

        let gray = frame_to_luma(frame);
        let blurred = gaussian_blur_f32(&gray, self.options.blur_sigma);
        if ticket.is_cancelled() {
            return None;
        }

        let edges = canny(&blurred, self.options.canny_low, self.options.canny_high);
        if ticket.is_cancelled() {
            return None;
        }

        let min_side = self.constraints.min_size * w.min(h) as f32;
        let vote_threshold = ((min_side * self.options.vote_ratio) as u32).max(self.options.min_votes);
        let lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold,
                suppression_radius: self.options.suppression_radius,
            },
        );
        trace!(line_count = lines.len(), vote_threshold, "Hough lines detected");
        if ticket.is_cancelled() {
            return None;
        }

        let (horizontal, vertical) = classify_lines(&lines, self.options.angle_tolerance);
        if horizontal.len() < 2 || vertical.len() < 2 {
            trace!(
                horizontal = horizontal.len(),
                vertical = vertical.len(),
                "Not enough edge lines for a quadrilateral"
            );
            return None;
        }

        let center = Point::new(w as f32 / 2.0, h as f32 / 2.0);
        let (top, bottom) = extreme_lines(&horizontal, |l| horizontal_position(l, center.x))?;
        let (left, right) = extreme_lines(&vertical, |l| vertical_position(l, center.y))?;

        let corners = [
            intersect_polar_lines(&top, &left)?,
            intersect_polar_lines(&top, &right)?,
            intersect_polar_lines(&bottom, &right)?,
            intersect_polar_lines(&bottom, &left)?,
        ];

        // Corners may land a pixel or two outside the frame from quantization.
        let slack = 2.0;
        if corners.iter().any(|c| {
            c.x < -slack || c.y < -slack || c.x > w as f32 + slack || c.y > h as f32 + slack
        }) {
            trace!(?corners, "Corner outside frame");
            return None;
        }

        Some(corners.map(|c| Point::new(c.x.clamp(0.0, w as f32), c.y.clamp(0.0, h as f32))))
    }

    /// Whether the pixel-space quad satisfies the card constraints.
    fn satisfies_constraints(&self, corners: &[Point; 4], frame: &Frame) -> bool {
        let [tl, tr, br, bl] = corners;
        let across = (tl.distance(tr) + bl.distance(br)) / 2.0;
        let down = (tl.distance(bl) + tr.distance(br)) / 2.0;
        let (long, short) = if across >= down { (across, down) } else { (down, across) };
        if short <= f32::EPSILON {
            return false;
        }

        let aspect = long / short;
        let min_side = self.constraints.min_size * frame.width().min(frame.height()) as f32;
        let ok = aspect >= self.constraints.min_aspect_ratio
            && aspect <= self.constraints.max_aspect_ratio
            && short >= min_side;
        debug!(aspect, short, min_side, accepted = ok, "Candidate quadrilateral checked");
        ok
    }
}

impl QuadDetector for HoughQuadDetector {
    #[instrument(skip_all, fields(frame = %frame.id(), generation = ticket.generation()))]
    fn detect(&self, frame: &Frame, ticket: &DetectionTicket) -> Result<Option<NormalizedQuad>> {
        if self.constraints.max_observations == 0 || ticket.is_cancelled() {
            return Ok(None);
        }

        let Some(corners) = self.find_corners(frame, ticket) else {
            return Ok(None);
        };
        if !self.satisfies_constraints(&corners, frame) {
            return Ok(None);
        }

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let normalize = |p: Point| Point::new((p.x / w).clamp(0.0, 1.0), (1.0 - p.y / h).clamp(0.0, 1.0));
        let [tl, tr, br, bl] = corners;
        let quad = NormalizedQuad::new(normalize(tl), normalize(tr), normalize(bl), normalize(br))?;
        debug!(?quad, "Card detected");
        Ok(Some(quad))
    }
}

// -- Line helpers -------------------------------------------------------------

/// Split lines into horizontal and vertical families.
///
/// `angle_in_degrees` is the angle of the line's normal, so a normal near 90
/// degrees is a horizontal line and one near 0 or 180 is a vertical line.
/// Diagonals are discarded.
fn classify_lines(lines: &[PolarLine], tolerance: u32) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for line in lines {
        let angle = line.angle_in_degrees;
        if angle.abs_diff(90) <= tolerance {
            horizontal.push(*line);
        } else if angle <= tolerance || angle >= 180 - tolerance {
            vertical.push(*line);
        }
    }

    (horizontal, vertical)
}

/// y of a near-horizontal line where it crosses `x`.
fn horizontal_position(line: &PolarLine, x: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - x * theta.cos()) / theta.sin()
}

/// x of a near-vertical line where it crosses `y`.
fn vertical_position(line: &PolarLine, y: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - y * theta.sin()) / theta.cos()
}

/// The lines with the smallest and largest position, if they are distinct.
fn extreme_lines(lines: &[PolarLine], position: impl Fn(&PolarLine) -> f32) -> Option<(PolarLine, PolarLine)> {
    let mut min: Option<(f32, PolarLine)> = None;
    let mut max: Option<(f32, PolarLine)> = None;
    for line in lines {
        let p = position(line);
        if !p.is_finite() {
            continue;
        }
        if min.is_none_or(|(m, _)| p < m) {
            min = Some((p, *line));
        }
        if max.is_none_or(|(m, _)| p > m) {
            max = Some((p, *line));
        }
    }
    let ((lo, low), (hi, high)) = (min?, max?);
    (hi - lo > 1.0).then_some((low, high))
}

/// Intersection of two lines given in polar (Hough) form
/// `x * cos(theta) + y * sin(theta) = r`. `None` when nearly parallel.
fn intersect_polar_lines(a: &PolarLine, b: &PolarLine) -> Option<Point> {
    let theta_a = (a.angle_in_degrees as f64).to_radians();
    let theta_b = (b.angle_in_degrees as f64).to_radians();
    let (sin_a, cos_a) = theta_a.sin_cos();
    let (sin_b, cos_b) = theta_b.sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (a.r as f64, b.r as f64);
    let x = (r_a * sin_b - r_b * sin_a) / denom;
    let y = (r_b * cos_a - r_a * cos_b) / denom;
    Some(Point::new(x as f32, y as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::TicketIssuer;
    use crate::frame::frame_from_image;
    use image::{DynamicImage, Rgba, RgbaImage};

    /// Bright axis-aligned rectangle on a dark portrait frame.
    fn card_frame(x0: u32, y0: u32, x1: u32, y1: u32) -> Frame {
        let mut img = RgbaImage::from_pixel(400, 600, Rgba([30, 30, 30, 255]));
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba([240, 240, 240, 255]));
            }
        }
        frame_from_image(&DynamicImage::ImageRgba8(img)).expect("frame")
    }

    fn assert_near(p: Point, x: f32, y: f32) {
        assert!(
            (p.x - x).abs() < 0.02 && (p.y - y).abs() < 0.02,
            "expected (~{x}, ~{y}), got {p:?}"
        );
    }

    #[test]
    fn detects_card_shaped_rectangle() {
        // 300x200 card: aspect 1.5, short side half the frame width.
        let frame = card_frame(50, 200, 350, 400);
        let detector = HoughQuadDetector::default();

        let quad = detector
            .detect(&frame, &DetectionTicket::detached())
            .expect("detect")
            .expect("card found");

        assert_near(quad.top_left(), 0.125, 1.0 - 200.0 / 600.0);
        assert_near(quad.top_right(), 0.875, 1.0 - 200.0 / 600.0);
        assert_near(quad.bottom_left(), 0.125, 1.0 - 400.0 / 600.0);
        assert_near(quad.bottom_right(), 0.875, 1.0 - 400.0 / 600.0);
    }

    #[test]
    fn rejects_square() {
        let frame = card_frame(75, 175, 325, 425);
        let detector = HoughQuadDetector::default();
        let result = detector.detect(&frame, &DetectionTicket::detached()).expect("detect");
        assert!(result.is_none());
    }

    #[test]
    fn rejects_small_card() {
        // Aspect 1.5 but the short side is only 60 px.
        let frame = card_frame(150, 270, 240, 330);
        let detector = HoughQuadDetector::default();
        let result = detector.detect(&frame, &DetectionTicket::detached()).expect("detect");
        assert!(result.is_none());
    }

    #[test]
    fn blank_frame_has_no_card() {
        let img = RgbaImage::from_pixel(200, 300, Rgba([200, 200, 200, 255]));
        let frame = frame_from_image(&DynamicImage::ImageRgba8(img)).expect("frame");
        let result = HoughQuadDetector::default()
            .detect(&frame, &DetectionTicket::detached())
            .expect("detect");
        assert!(result.is_none());
    }

    #[test]
    fn cancelled_ticket_short_circuits() {
        let frame = card_frame(50, 200, 350, 400);
        let issuer = TicketIssuer::new();
        let stale = issuer.issue();
        let _newer = issuer.issue();

        let result = HoughQuadDetector::default().detect(&frame, &stale).expect("detect");
        assert!(result.is_none());
    }

    #[test]
    fn zero_observations_detects_nothing() {
        let frame = card_frame(50, 200, 350, 400);
        let constraints = DetectionConstraints {
            max_observations: 0,
            ..DetectionConstraints::default()
        };
        let result = HoughQuadDetector::new(constraints)
            .detect(&frame, &DetectionTicket::detached())
            .expect("detect");
        assert!(result.is_none());
    }

    #[test]
    fn intersect_polar_lines_perpendicular() {
        // Horizontal line y=100 has its normal at 90 degrees.
        let h = PolarLine { r: 100.0, angle_in_degrees: 90 };
        // Vertical line x=50 has its normal at 0 degrees.
        let v = PolarLine { r: 50.0, angle_in_degrees: 0 };

        let pt = intersect_polar_lines(&h, &v).expect("should intersect");
        assert!((pt.x - 50.0).abs() < 0.5 && (pt.y - 100.0).abs() < 0.5, "got {pt:?}");
    }

    #[test]
    fn intersect_polar_lines_parallel_returns_none() {
        let a = PolarLine { r: 50.0, angle_in_degrees: 0 };
        let b = PolarLine { r: 100.0, angle_in_degrees: 0 };
        assert!(intersect_polar_lines(&a, &b).is_none());
    }

    #[test]
    fn classify_by_normal_angle() {
        let lines = vec![
            PolarLine { r: 10.0, angle_in_degrees: 90 },   // horizontal
            PolarLine { r: 20.0, angle_in_degrees: 85 },   // horizontal
            PolarLine { r: 30.0, angle_in_degrees: 0 },    // vertical
            PolarLine { r: -40.0, angle_in_degrees: 175 }, // vertical
            PolarLine { r: 50.0, angle_in_degrees: 45 },   // diagonal, dropped
        ];

        let (horiz, vert) = classify_lines(&lines, 20);
        assert_eq!(horiz.len(), 2);
        assert_eq!(vert.len(), 2);
    }

    #[test]
    fn vertical_position_handles_obtuse_normals() {
        // x = 40 expressed with a normal at 180 degrees: -x = r.
        let line = PolarLine { r: -40.0, angle_in_degrees: 179 };
        let x = vertical_position(&line, 0.0);
        assert!((x - 40.0).abs() < 0.1, "got {x}");
    }

    #[test]
    fn extreme_lines_need_two_distinct_positions() {
        let one = [PolarLine { r: 10.0, angle_in_degrees: 90 }];
        assert!(extreme_lines(&one, |l| horizontal_position(l, 0.0)).is_none());

        let two = [
            PolarLine { r: 80.0, angle_in_degrees: 90 },
            PolarLine { r: 10.0, angle_in_degrees: 90 },
        ];
        let (top, bottom) = extreme_lines(&two, |l| horizontal_position(l, 0.0)).expect("pair");
        assert_eq!(top.r, 10.0);
        assert_eq!(bottom.r, 80.0);
    }
}
