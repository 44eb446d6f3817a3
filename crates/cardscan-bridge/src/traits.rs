// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.

use std::sync::Arc;

use cardscan_core::config::CaptureConfig;
use cardscan_core::error::Result;
use cardscan_core::FrameSink;

/// Unified bridge that groups the native capabilities the scanner uses.
pub trait PlatformBridge: NativeCamera + NativePhotoLibrary + Send + Sync {
    /// Human-readable platform name (e.g. "iOS 17", "Folder replay").
    fn platform_name(&self) -> &str;
}

/// Live video from the back camera.
pub trait NativeCamera {
    /// Configure the capture output and start pushing frames into `sink`
    /// from the camera's own background context.
    ///
    /// Returns `CardscanError::NoCamera` when no suitable device exists,
    /// which is fatal for a scanning session.
    fn start_capture(&self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<()>;

    /// Stop delivering frames. Idempotent.
    fn stop_capture(&self) -> Result<()>;
}

/// The device photo store.
pub trait NativePhotoLibrary {
    /// Persist an encoded PNG. Returns a platform-specific locator for the
    /// saved asset (a file path, an asset identifier).
    fn save_image(&self, png: &[u8]) -> Result<String>;
}
