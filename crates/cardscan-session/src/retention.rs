// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad retention — the single "current best" detection kept for capture.

use cardscan_core::config::RetentionPolicy;
use cardscan_core::{Frame, NormalizedQuad};
use tracing::debug;

/// A detected quad together with the frame it was found in.
#[derive(Debug, Clone)]
pub struct Retained {
    pub quad: NormalizedQuad,
    pub frame: Frame,
}

/// Result of recording a frame without a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    /// Nothing was retained to begin with.
    Empty,
    /// The previous detection is still held.
    Held,
    /// The miss limit was reached and the previous detection was dropped.
    Expired,
}

/// Holds at most one retained detection. Absence is explicit; there is no
/// default quad.
#[derive(Debug)]
pub struct Retention {
    current: Option<Retained>,
    missed: u32,
    policy: RetentionPolicy,
}

impl Retention {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            current: None,
            missed: 0,
            policy,
        }
    }

    /// Overwrite whatever was retained with a fresh detection.
    pub fn record_detection(&mut self, frame: Frame, quad: NormalizedQuad) {
        self.current = Some(Retained { quad, frame });
        self.missed = 0;
    }

    /// Count a frame that produced no detection.
    pub fn record_miss(&mut self) -> MissOutcome {
        if self.current.is_none() {
            return MissOutcome::Empty;
        }
        self.missed = self.missed.saturating_add(1);
        match self.policy.max_missed_frames {
            Some(limit) if self.missed >= limit => {
                debug!(missed = self.missed, limit, "retained quad expired");
                self.current = None;
                self.missed = 0;
                MissOutcome::Expired
            }
            _ => MissOutcome::Held,
        }
    }

    pub fn current(&self) -> Option<&Retained> {
        self.current.as_ref()
    }

    /// Consecutive misses since the last detection.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Hand the retained detection to a consumer, leaving nothing behind.
    pub fn take(&mut self) -> Option<Retained> {
        self.missed = 0;
        self.current.take()
    }
}
