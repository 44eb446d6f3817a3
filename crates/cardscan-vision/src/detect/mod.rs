// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral detection — the detector seam and cancellation tickets.

pub mod hough;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cardscan_core::error::Result;
use cardscan_core::{Frame, NormalizedQuad};

pub use hough::{HoughOptions, HoughQuadDetector};

/// Finds at most one card-shaped quadrilateral in a frame.
///
/// Implementations run on a blocking worker. They should poll
/// [`DetectionTicket::is_cancelled`] between expensive stages and return
/// `Ok(None)` once it trips; the caller discards the result anyway.
pub trait QuadDetector: Send + Sync {
    fn detect(&self, frame: &Frame, ticket: &DetectionTicket) -> Result<Option<NormalizedQuad>>;
}

/// Cancellation token for one detection request.
///
/// A ticket is current while the issuer's latest generation equals its own.
/// Issuing a newer ticket, or calling [`TicketIssuer::cancel`], supersedes it.
#[derive(Debug, Clone)]
pub struct DetectionTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl DetectionTicket {
    /// A ticket that is never cancelled, for one-off detections.
    pub fn detached() -> Self {
        Self {
            generation: 0,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// Hands out tickets; each new ticket supersedes all earlier ones.
#[derive(Debug, Default)]
pub struct TicketIssuer {
    latest: Arc<AtomicU64>,
}

impl TicketIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> DetectionTicket {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        DetectionTicket {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Supersede every outstanding ticket without issuing a new one.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether `generation` is still the latest issued.
    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::Acquire) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_cancels_older() {
        let issuer = TicketIssuer::new();
        let first = issuer.issue();
        assert!(!first.is_cancelled());

        let second = issuer.issue();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(issuer.is_current(second.generation()));
        assert!(!issuer.is_current(first.generation()));
    }

    #[test]
    fn cancel_supersedes_outstanding() {
        let issuer = TicketIssuer::new();
        let ticket = issuer.issue();
        issuer.cancel();
        assert!(ticket.is_cancelled());
    }

    #[test]
    fn detached_ticket_never_cancelled() {
        let ticket = DetectionTicket::detached();
        assert!(!ticket.is_cancelled());
        assert!(!ticket.clone().is_cancelled());
    }
}
