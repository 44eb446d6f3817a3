// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-vision — Image-side collaborators for the scanner session.
//
// Provides card quadrilateral detection (Canny edges + Hough lines), projective
// perspective correction, raster overlay rendering, and conversions between
// camera frames and `image` buffers.

pub mod correct;
pub mod detect;
pub mod frame;
pub mod overlay;

pub use correct::{PerspectiveCorrector, ProjectionCorrector};
pub use detect::{DetectionTicket, HoughQuadDetector, QuadDetector, TicketIssuer};
pub use overlay::{OverlaySurface, RasterOverlay};
