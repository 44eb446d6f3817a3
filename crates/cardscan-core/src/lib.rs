// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan — Core geometry, frame model, configuration, and error definitions
// shared across all crates.

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;

pub use config::ScannerConfig;
pub use error::CardscanError;
pub use frame::{Frame, FrameId, FrameSink, FrameSubmission};
pub use geometry::{NormalizedQuad, Point, SurfaceSize, ViewQuad, map_to_surface};
