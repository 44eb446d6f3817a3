// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration.

use serde::{Deserialize, Serialize};

/// Persistent scanner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub capture: CaptureConfig,
    pub detection: DetectionConstraints,
    pub retention: RetentionPolicy,
    pub overlay: OverlayStyle,
    pub session: SessionConfig,
}

/// Pixel layout delivered by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit BGRA, one byte per channel.
    Bgra8,
}

/// Orientation the capture connection is locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
}

/// How the camera is asked to deliver frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub pixel_format: PixelFormat,
    pub orientation: Orientation,
    /// Drop frames that arrive while the consumer is busy instead of queueing.
    pub discard_late_frames: bool,
    /// Delivery rate for replayed sources (folder camera). Native cameras
    /// run at their own cadence.
    pub frames_per_second: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Bgra8,
            orientation: Orientation::Portrait,
            discard_late_frames: true,
            frames_per_second: 30,
        }
    }
}

/// Shape constraints a detection must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConstraints {
    /// Lower bound on long side / short side.
    pub min_aspect_ratio: f32,
    /// Upper bound on long side / short side.
    pub max_aspect_ratio: f32,
    /// Short side relative to the smaller frame dimension.
    pub min_size: f32,
    /// At most this many quads per frame; the pipeline keeps the first.
    pub max_observations: usize,
}

impl Default for DetectionConstraints {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 1.3,
            max_aspect_ratio: 1.6,
            min_size: 0.4,
            max_observations: 1,
        }
    }
}

/// When a retained quad stops being trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Consecutive frames without a detection before the retained quad and
    /// its overlay are dropped. `None` holds the last detection forever.
    pub max_missed_frames: Option<u32>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_missed_frames: Some(30),
        }
    }
}

/// Overlay outline appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// RGBA stroke colour.
    pub stroke_rgba: [u8; 4],
    /// Stroke width in pixels, clamped to `1..=32` when drawn.
    pub stroke_width: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_rgba: [255, 0, 0, 255],
            stroke_width: 3,
        }
    }
}

/// How superseded detections are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupersedePolicy {
    /// A newer frame cancels the detection in flight once that detection has
    /// run longer than `SessionConfig::cancel_after_ms`. Younger detections
    /// are left to finish and the newest frame waits.
    CancelInFlight,
    /// The in-flight detection completes; the newest frame waits for it.
    FinishInFlight,
}

/// Scanner session tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub supersede: SupersedePolicy,
    /// Age after which `CancelInFlight` may abandon a detection.
    pub cancel_after_ms: u64,
    /// Depth of the command channel (capture, resize, snapshot).
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            supersede: SupersedePolicy::FinishInFlight,
            cancel_after_ms: 250,
            command_buffer: 16,
        }
    }
}
