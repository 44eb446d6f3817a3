// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Captured video frames and the push interface cameras deliver them into.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CardscanError, Result};

const BYTES_PER_PIXEL: usize = 4;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Monotonic identifier assigned to each frame at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl FrameId {
    pub fn next() -> Self {
        Self(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One captured image in 32-bit BGRA layout.
///
/// The pixel buffer is shared, so cloning a `Frame` is cheap and the data
/// lives exactly as long as the last holder (detector, retention, capture).
#[derive(Clone)]
pub struct Frame {
    id: FrameId,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    data: Arc<[u8]>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap a BGRA buffer. Rows may be padded (`bytes_per_row >= width * 4`).
    pub fn from_bgra(width: u32, height: u32, bytes_per_row: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CardscanError::InvalidFrame(format!(
                "empty frame {width}x{height}"
            )));
        }
        let overflow = || CardscanError::InvalidFrame(format!("frame {width}x{height} too large"));
        let min_row = (width as usize)
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(overflow)?;
        if bytes_per_row < min_row {
            return Err(CardscanError::InvalidFrame(format!(
                "row stride {bytes_per_row} shorter than {min_row} bytes"
            )));
        }
        let needed = bytes_per_row
            .checked_mul(height as usize - 1)
            .and_then(|rows| rows.checked_add(min_row))
            .ok_or_else(overflow)?;
        if data.len() < needed {
            return Err(CardscanError::InvalidFrame(format!(
                "buffer holds {} bytes, need {needed}",
                data.len()
            )));
        }
        Ok(Self {
            id: FrameId::next(),
            width,
            height,
            bytes_per_row,
            data: data.into(),
            captured_at: Utc::now(),
        })
    }

    /// Build a frame from tightly packed RGBA pixels, swizzling to BGRA.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| CardscanError::InvalidFrame(format!("frame {width}x{height} too large")))?;
        if rgba.len() != expected {
            return Err(CardscanError::InvalidFrame(format!(
                "RGBA buffer holds {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        let mut bgra = rgba.to_vec();
        for px in bgra.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        Self::from_bgra(width, height, width as usize * BYTES_PER_PIXEL, bgra)
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Raw BGRA bytes including any row padding.
    pub fn bgra(&self) -> &[u8] {
        &self.data
    }

    /// Tightly packed RGBA copy of the pixels, row padding removed.
    pub fn to_rgba(&self) -> Vec<u8> {
        let row_len = self.width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_len * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * self.bytes_per_row;
            for px in self.data[start..start + row_len].chunks_exact(BYTES_PER_PIXEL) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        out
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_row", &self.bytes_per_row)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

/// What happened to a frame handed to a [`FrameSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubmission {
    /// Queued for detection.
    Accepted,
    /// The consumer was still busy; the frame was discarded.
    DroppedLate,
    /// The consumer has shut down.
    Closed,
}

/// Receiver of camera frames. Implementations must not block the caller.
pub trait FrameSink: Send + Sync {
    fn push_frame(&self, frame: Frame) -> FrameSubmission;
}
