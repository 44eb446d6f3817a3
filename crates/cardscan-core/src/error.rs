// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cardscan.

use thiserror::Error;

/// Top-level error type for all cardscan operations.
#[derive(Debug, Error)]
pub enum CardscanError {
    // -- Capture pipeline --
    #[error("no camera device available: {0}")]
    NoCamera(String),

    #[error("camera output unavailable: {0}")]
    CameraOutput(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    // -- Detection / geometry --
    #[error("invalid quadrilateral: {0}")]
    InvalidQuad(String),

    #[error("quadrilateral detection failed: {0}")]
    Detection(String),

    #[error("no quadrilateral has been detected yet")]
    NothingToCapture,

    // -- Correction / output --
    #[error("perspective correction failed: {0}")]
    Correction(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("photo storage failed: {0}")]
    Storage(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge / session --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    #[error("scanner session has shut down")]
    SessionClosed,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CardscanError>;
