// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-session — The live scanning session.
//
// Ties camera frames, the quad detector, the preview overlay, and the photo
// library together: the latest card detection is retained, drawn, and turned
// into a flattened photo on request.

pub mod capture;
pub mod retention;
pub mod session;

pub use capture::{CaptureReceipt, run_capture};
pub use retention::{MissOutcome, Retained, Retention};
pub use session::{Collaborators, ScanSnapshot, ScannerHandle, ScannerSession, SessionStats};
